use super::{EncoderLogger, ParamSnapshot};
use crate::common::*;

/// Summary statistics of a logged tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl HistogramSummary {
    pub fn from_tensor(tensor: &Tensor) -> Fallible<Self> {
        let values = tensor.f_detach()?.f_to_kind(Kind::Double)?;
        let count = values.numel();
        if count == 0 {
            return Ok(Self {
                count,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
            });
        }

        Ok(Self {
            count,
            min: values.f_min()?.double_value(&[]),
            max: values.f_max()?.double_value(&[]),
            mean: values.f_mean(Kind::Double)?.double_value(&[]),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    Histogram {
        tag: String,
        step: usize,
        summary: HistogramSummary,
    },
    Image {
        tag: String,
        step: usize,
        shape: Vec<i64>,
    },
    Param {
        tag: String,
        step: usize,
        weight_shape: Option<Vec<i64>>,
        bias_shape: Option<Vec<i64>>,
    },
}

impl LogRecord {
    pub fn tag(&self) -> &str {
        match self {
            Self::Histogram { tag, .. } | Self::Image { tag, .. } | Self::Param { tag, .. } => {
                tag
            }
        }
    }

    pub fn step(&self) -> usize {
        match *self {
            Self::Histogram { step, .. } | Self::Image { step, .. } | Self::Param { step, .. } => {
                step
            }
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Vec<LogRecord>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn tags(&self) -> Vec<&str> {
        self.records.iter().map(LogRecord::tag).collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl EncoderLogger for MemoryLogger {
    fn log_histogram(&mut self, tag: &str, values: &Tensor, step: usize) -> Fallible<()> {
        self.records.push(LogRecord::Histogram {
            tag: tag.to_owned(),
            step,
            summary: HistogramSummary::from_tensor(values)?,
        });
        Ok(())
    }

    fn log_image(&mut self, tag: &str, image: &Tensor, step: usize) -> Fallible<()> {
        self.records.push(LogRecord::Image {
            tag: tag.to_owned(),
            step,
            shape: image.size(),
        });
        Ok(())
    }

    fn log_param(&mut self, tag: &str, param: &ParamSnapshot<'_>, step: usize) -> Fallible<()> {
        self.records.push(LogRecord::Param {
            tag: tag.to_owned(),
            step,
            weight_shape: param.weight.map(Tensor::size),
            bias_shape: param.bias.map(Tensor::size),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_values() {
        let values = Tensor::of_slice(&[0.0_f32, 0.5, 1.0, 1.0, -1.0]);
        let summary = HistogramSummary::from_tensor(&values).unwrap();

        assert_eq!(summary.count, 5);
        assert_eq!(summary.min, -1.0);
        assert_eq!(summary.max, 1.0);
        assert!((summary.mean - 0.3).abs() < 1e-6);
    }

    #[test]
    fn summary_of_nothing() {
        let values = Tensor::zeros(&[0], (Kind::Float, Device::Cpu));
        let summary = HistogramSummary::from_tensor(&values).unwrap();

        assert_eq!(summary.count, 0);
    }

    #[test]
    fn param_records_keep_shapes() {
        let weight = Tensor::zeros(&[4, 3], (Kind::Float, Device::Cpu));
        let mut logger = MemoryLogger::new();
        logger
            .log_param(
                "fc",
                &ParamSnapshot {
                    weight: Some(&weight),
                    bias: None,
                },
                3,
            )
            .unwrap();

        assert_eq!(
            logger.records(),
            [LogRecord::Param {
                tag: "fc".into(),
                step: 3,
                weight_shape: Some(vec![4, 3]),
                bias_shape: None,
            }]
        );
    }
}
