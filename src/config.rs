//! Engine configuration

/// Tunables for the update engine. Built by the embedding application.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub max_transporters: usize,
    /// Multiplier from the human-entered weight unit (tonnes) to the stored
    /// unit (kilograms).
    pub weight_scale: f64,
    pub document_hrp: String,
    pub transporter_hrp: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_transporters: 5,
            weight_scale: 1000.0,
            document_hrp: "bsda".to_string(),
            transporter_hrp: "trs".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }
    /// Capped at 255, the highest position a chain entry can be numbered.
    pub fn with_max_transporters(mut self, max: usize) -> Self {
        self.max_transporters = max.min(u8::MAX as usize);
        self
    }
    pub fn with_weight_scale(mut self, scale: f64) -> Self {
        self.weight_scale = scale;
        self
    }
    pub fn with_document_hrp(mut self, hrp: &str) -> Self {
        self.document_hrp = hrp.to_string();
        self
    }
    pub fn with_transporter_hrp(mut self, hrp: &str) -> Self {
        self.transporter_hrp = hrp.to_string();
        self
    }
}
