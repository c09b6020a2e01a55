use crate::{common::*, env::EnvWrapperInit, model::PixelEncoderInit};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(
        serialize_with = "serialize_device",
        deserialize_with = "deserialize_device",
        default = "default_device"
    )]
    pub device: Device,
    pub encoder: PixelEncoderInit,
    pub env: Option<EnvWrapperInit>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub smoke: SmokeConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Fallible<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = json5::from_str(&text)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub log_dir: PathBuf,
    pub log_freq: NonZeroUsize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: PathBuf::from("logs"),
            log_freq: NonZeroUsize::new(1000).unwrap(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmokeConfig {
    pub batch_size: NonZeroUsize,
    pub step: usize,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            batch_size: NonZeroUsize::new(8).unwrap(),
            step: 0,
        }
    }
}

fn default_device() -> Device {
    Device::cuda_if_available()
}

fn serialize_device<S>(device: &Device, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let text = match device {
        Device::Cpu => "cpu".into(),
        Device::Cuda(n) => format!("cuda({})", n),
    };
    text.serialize(serializer)
}

fn deserialize_device<'de, D>(deserializer: D) -> Result<Device, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    parse_device(&name).ok_or_else(|| D::Error::custom(format!("invalid device name {}", name)))
}

fn parse_device(name: &str) -> Option<Device> {
    let device = match name {
        "cpu" => Device::Cpu,
        "cuda" => Device::Cuda(0),
        _ => {
            let number = name.strip_prefix("cuda(")?.strip_suffix(')')?.parse().ok()?;
            Device::Cuda(number)
        }
    };
    Some(device)
}
