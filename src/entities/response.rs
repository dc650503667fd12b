use serde::Deserialize;

use crate::error::Error;

#[derive(Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct CreateContainerGroupResponse {
    pub request_id: String,
    pub container_group_id: String,
}

/// Body of a failed ECI call.
#[derive(Deserialize, Clone, Default, Debug)]
#[serde(rename_all = "PascalCase", default)]
pub struct ErrorResponse {
    pub request_id: String,
    pub code: String,
    pub message: String,
    pub recommend: Option<String>,
}

impl ErrorResponse {
    /// Falls back to the raw body when it is not the usual JSON error shape.
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str::<Self>(body) {
            Ok(response) if !response.code.is_empty() || !response.message.is_empty() => {
                response
            }
            Ok(response) => Self {
                message: body.to_owned(),
                ..response
            },
            Err(_) => Self {
                message: body.to_owned(),
                ..Default::default()
            },
        }
    }

    pub fn into_error(self, status: u16) -> Error {
        let message = match self.recommend {
            Some(recommend) => format!("{} ({})", self.message, recommend),
            None => self.message,
        };
        Error::Remote {
            status,
            code: self.code,
            message,
            request_id: self.request_id,
        }
    }
}
