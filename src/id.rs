//! Composite identifiers.
//!
//! Credentials live under a project, so a single Terraform-style `id` has to
//! carry both numbers: `"<project_id>:<credential_id>"`.

use thiserror::Error;

/// Separator between the parts of a composite ID.
pub const ID_DELIMITER: &str = ":";

/// Errors produced when decoding a composite ID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The ID did not split into exactly two parts.
    #[error("expected ID in the format 'project_id{ID_DELIMITER}credential_id' for {resource_type}, got: {id:?}")]
    WrongFormat {
        /// The resource type the ID was meant for.
        resource_type: String,
        /// The offending ID.
        id: String,
    },

    /// One of the parts is not an integer.
    #[error("failed to convert {part:?} to an integer for {resource_type}, got: {id:?}")]
    NotAnInteger {
        /// The resource type the ID was meant for.
        resource_type: String,
        /// The part that failed to parse.
        part: String,
        /// The offending ID.
        id: String,
    },
}

/// Join a project ID and a credential ID.
pub fn encode(project_id: i64, credential_id: i64) -> String {
    format!("{project_id}{ID_DELIMITER}{credential_id}")
}

/// Split a composite ID back into `(project_id, credential_id)`.
///
/// `resource_type` only feeds the error message.
pub fn decode(id: &str, resource_type: &str) -> Result<(i64, i64), IdError> {
    let parts: Vec<&str> = id.split(ID_DELIMITER).collect();
    let [project, credential] = parts.as_slice() else {
        return Err(IdError::WrongFormat {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        });
    };

    let parse = |part: &str| {
        part.parse::<i64>().map_err(|_| IdError::NotAnInteger {
            resource_type: resource_type.to_string(),
            part: part.to_string(),
            id: id.to_string(),
        })
    };

    Ok((parse(project)?, parse(credential)?))
}
