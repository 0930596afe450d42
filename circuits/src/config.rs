use serde::{Deserialize, Serialize};

use crate::error::CircuitError;

/// Largest state tree depth the sparse tree indexes with `u64` leaves.
pub const MAX_STATE_TREE_DEPTH: u8 = 32;

/// Largest batch capacity a circuit may be built for.
pub const MAX_BATCH_CAPACITY: usize = 256;

/// Bit length of the BN254 scalar field modulus.
pub const FIELD_BITS: u32 = 254;

/// Protocol parameters fixed per deployment. Circuits built with different
/// parameters have different shapes and need their own keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig
{
    /// The depth of the state tree.
    pub state_tree_depth: u8,

    /// The fixed number of message slots in a batch.
    pub max_batch_size: usize,

    /// The credit balance of a freshly registered leaf.
    pub initial_credit_balance: u64,

    /// The re-randomization scalar must exceed `2^randomness_threshold_bits`.
    pub randomness_threshold_bits: u32,

    /// The re-randomization scalar must fit in this many bits.
    pub full_scalar_bits: u32,
}

impl Default for ProtocolConfig
{
    fn default() -> Self
    {
        ProtocolConfig {
            state_tree_depth: 10,
            max_batch_size: 32,
            initial_credit_balance: 100,
            randomness_threshold_bits: 200,
            full_scalar_bits: 253,
        }
    }
}

impl ProtocolConfig
{
    /// Parses a JSON document, filling absent fields with defaults, and validates it.
    pub fn from_json(json: &str) -> Result<Self, CircuitError>
    {
        let config: ProtocolConfig = serde_json::from_str(json)
            .map_err(|e| CircuitError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CircuitError>
    {
        if self.state_tree_depth == 0 || self.state_tree_depth > MAX_STATE_TREE_DEPTH
        {
            Err(CircuitError::InvalidConfig(format!(
                "state_tree_depth must be within 1..={}, got {}",
                MAX_STATE_TREE_DEPTH, self.state_tree_depth
            )))?
        }

        if self.max_batch_size == 0 || self.max_batch_size > MAX_BATCH_CAPACITY
        {
            Err(CircuitError::InvalidConfig(format!(
                "max_batch_size must be within 1..={}, got {}",
                MAX_BATCH_CAPACITY, self.max_batch_size
            )))?
        }

        // A range check of FIELD_BITS or more cannot detect wraparound.
        if self.full_scalar_bits == 0 || self.full_scalar_bits >= FIELD_BITS
        {
            Err(CircuitError::InvalidConfig(format!(
                "full_scalar_bits must be within 1..{}, got {}",
                FIELD_BITS, self.full_scalar_bits
            )))?
        }

        if self.randomness_threshold_bits >= self.full_scalar_bits
        {
            Err(CircuitError::InvalidConfig(format!(
                "randomness_threshold_bits ({}) must be below full_scalar_bits ({})",
                self.randomness_threshold_bits, self.full_scalar_bits
            )))?
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn defaults_are_valid()
    {
        let config = ProtocolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_batch_size, 32);
        assert_eq!(config.full_scalar_bits, 253);
    }

    #[test]
    fn json_fills_missing_fields()
    {
        let config = ProtocolConfig::from_json(r#"{ "state_tree_depth": 4 }"#).unwrap();
        assert_eq!(config.state_tree_depth, 4);
        assert_eq!(config.max_batch_size, 32);
        assert_eq!(config.initial_credit_balance, 100);
    }

    #[test]
    fn rejects_out_of_range_parameters()
    {
        assert!(ProtocolConfig::from_json(r#"{ "max_batch_size": 0 }"#).is_err());
        assert!(ProtocolConfig::from_json(r#"{ "max_batch_size": 257 }"#).is_err());
        assert!(ProtocolConfig::from_json(r#"{ "state_tree_depth": 0 }"#).is_err());
        assert!(ProtocolConfig::from_json(r#"{ "full_scalar_bits": 254 }"#).is_err());
        assert!(ProtocolConfig::from_json(r#"{ "randomness_threshold_bits": 253 }"#).is_err());
        assert!(ProtocolConfig::from_json("not json").is_err());
    }
}
