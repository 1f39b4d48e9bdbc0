//! Parameter validation against a tool's JSON schema.

use relay_types::RelayError;
use serde_json::Value;

/// Checks raw params against a schema before setup runs.
pub trait ParamValidator: Send + Sync {
    /// Check that `schema` is usable at all. Called once at registration.
    fn check_schema(&self, schema: &Value) -> Result<(), RelayError>;

    /// Return the params the tool will see, or a [`RelayError::Validation`].
    fn validate(&self, schema: &Value, params: &Value) -> Result<Value, RelayError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSchemaValidator;

impl ParamValidator for JsonSchemaValidator {
    fn check_schema(&self, schema: &Value) -> Result<(), RelayError> {
        jsonschema::validator_for(schema)
            .map(|_| ())
            .map_err(|e| RelayError::InvalidSchema {
                message: e.to_string(),
            })
    }

    fn validate(&self, schema: &Value, params: &Value) -> Result<Value, RelayError> {
        let validator = jsonschema::validator_for(schema).map_err(|e| RelayError::InvalidSchema {
            message: e.to_string(),
        })?;
        if let Err(err) = validator.validate(params) {
            return Err(RelayError::Validation {
                message: err.to_string(),
            });
        }
        Ok(params.clone())
    }
}
