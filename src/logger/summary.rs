use super::{tile_channels, EncoderLogger, ParamSnapshot};
use crate::common::*;
use tfrecord::{ColorSpace, EventWriter, EventWriterConfig, TchChannelOrder, TchTensorAsImage};

const EVENT_FILE_PREFIX: &str = "encoder";

/// Writes TensorBoard summaries into a log directory.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct SummaryLogger {
    log_dir: PathBuf,
    #[derivative(Debug = "ignore")]
    writer: EventWriter<BufWriter<File>>,
}

impl SummaryLogger {
    pub fn create<P>(log_dir: P) -> Fallible<Self>
    where
        P: AsRef<Path>,
    {
        let log_dir = log_dir.as_ref().to_owned();
        fs::create_dir_all(&log_dir)
            .with_context(|| format!("failed to create log dir {}", log_dir.display()))?;

        let prefix = log_dir.join(EVENT_FILE_PREFIX);
        let prefix = prefix
            .to_str()
            .ok_or_else(|| format_err!("non-UTF-8 log dir {}", log_dir.display()))?;
        let writer = EventWriter::from_prefix(prefix, "", EventWriterConfig::default())?;
        debug!("writing encoder summaries to {}", log_dir.display());

        Ok(Self { log_dir, writer })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

impl EncoderLogger for SummaryLogger {
    fn log_histogram(&mut self, tag: &str, values: &Tensor, step: usize) -> Fallible<()> {
        let values = values
            .f_detach()?
            .f_to_kind(Kind::Float)?
            .to_device(Device::Cpu);
        self.writer.write_histogram(tag, step as i64, &values)?;
        Ok(())
    }

    fn log_image(&mut self, tag: &str, image: &Tensor, step: usize) -> Fallible<()> {
        let tiles = tile_channels(image)?.to_device(Device::Cpu);
        let tiles = TchTensorAsImage::new(ColorSpace::Luma, TchChannelOrder::CHW, tiles)?;
        self.writer.write_image(tag, step as i64, tiles)?;
        Ok(())
    }

    fn log_param(&mut self, tag: &str, param: &ParamSnapshot<'_>, step: usize) -> Fallible<()> {
        let parts = [("w", param.weight), ("b", param.bias)];

        for (suffix, tensor) in parts {
            let tensor = match tensor {
                Some(tensor) => tensor,
                None => continue,
            };
            self.log_histogram(&format!("{}_{}", tag, suffix), tensor, step)?;

            let grad = tensor.grad();
            if grad.defined() {
                self.log_histogram(&format!("{}_{}_g", tag, suffix), &grad, step)?;
            }
        }

        Ok(())
    }
}
