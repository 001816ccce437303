use serde::{Deserialize, Serialize};

/// Which UI flow opened the telemetry session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TelemetryFlavor {
    /// A standalone payment component.
    Components { payment_method: String },
    /// The drop-in container itself.
    DropIn {
        kind: String,
        payment_methods: Vec<String>,
    },
    /// A component hosted inside drop-in. Its container already owns the
    /// attempt identifier, so it never performs a handshake of its own.
    DropInComponent,
}

impl TelemetryFlavor {
    pub fn components(payment_method: impl Into<String>) -> Self {
        TelemetryFlavor::Components {
            payment_method: payment_method.into(),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, TelemetryFlavor::DropInComponent)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TelemetryFlavor::Components { .. } => "components",
            TelemetryFlavor::DropIn { .. } => "dropin",
            TelemetryFlavor::DropInComponent => "dropInComponent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amount {
    /// Minor units.
    pub value: i64,
    pub currency: String,
}

impl Amount {
    pub fn new(value: i64, currency: impl Into<String>) -> Self {
        Self {
            value,
            currency: currency.into(),
        }
    }
}

/// Extra correlation fields sent with the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}
