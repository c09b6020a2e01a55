use crate::common::*;

/// Intermediate activations recorded by a single forward pass, in recording order.
#[derive(Debug, Default)]
pub struct EncoderDiagnostics {
    entries: Vec<(String, Tensor)>,
}

impl EncoderDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an activation. A name recorded twice keeps its first position
    /// and takes the latest value.
    pub fn record<S>(&mut self, name: S, tensor: &Tensor)
    where
        S: Into<String>,
    {
        let name = name.into();
        let tensor = tensor.shallow_clone();

        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = tensor,
            None => self.entries.push((name, tensor)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, tensor)| tensor)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> + '_ {
        self.entries
            .iter()
            .map(|(name, tensor)| (name.as_str(), tensor))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
