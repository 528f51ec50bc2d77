use serde::{Deserialize, Serialize};

/// Travel style sliders, each 0-100.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleAxes {
    /// 0 = shoestring, 100 = indulgent.
    pub budget_vs_luxury: Option<u8>,
    pub chill_vs_intense: Option<u8>,
    pub city_vs_nature: Option<u8>,
    pub local_vs_touristy: Option<u8>,
}

/// Where a preference change came from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOrigin {
    Chat,
    #[default]
    Widget,
}

/// A `preferences:updated` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferenceUpdate {
    /// 0-100.
    pub comfort_level: Option<u8>,
    pub style_axes: Option<StyleAxes>,
    pub must_haves: Vec<String>,
    pub origin: UpdateOrigin,
}

impl PreferenceUpdate {
    pub fn touches_budget_signals(&self) -> bool {
        self.comfort_level.is_some() || self.style_axes.is_some() || !self.must_haves.is_empty()
    }
}
