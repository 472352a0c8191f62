//! `AdminConfig` (§3) — durable, hot-reloadable tuning parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A saved bundle of admin-config parameters a UI can apply in one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub params: Value,
}

/// Admin-tunable parameters shared by the Strategy Engine and the Sample
/// Library. Mirrored to a distributed KV store when one is configured
/// (§4.5) so workers observe changes without a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub system_prompt: String,
    /// `[0, 1]`: 0 prefers BPM-led transitions, 1 prefers harmony-led.
    pub mix_sensitivity: f64,
    /// One of `{16, 32, 64}`.
    pub default_bars: u32,
    /// `[0, 1]`: intensity used to place the bass swap within the crossfade.
    pub bass_swap_intensity: f64,
    pub allow_instruments_ai: bool,
    pub allow_vocals_ai: bool,
    pub presets: Vec<Preset>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are an expert club DJ planning track transitions.".to_string(),
            mix_sensitivity: 0.5,
            default_bars: 32,
            bass_swap_intensity: 0.5,
            allow_instruments_ai: true,
            allow_vocals_ai: true,
            presets: Vec::new(),
        }
    }
}

impl AdminConfig {
    /// Clamp every numeric field into its documented range so callers never
    /// have to revalidate (§4.5).
    pub fn clamped(mut self) -> Self {
        self.mix_sensitivity = self.mix_sensitivity.clamp(0.0, 1.0);
        self.bass_swap_intensity = self.bass_swap_intensity.clamp(0.0, 1.0);
        self.default_bars = match self.default_bars {
            16 | 32 | 64 => self.default_bars,
            _ => 32,
        };
        self
    }

    /// Apply a partial JSON patch (unset fields unchanged), matching the
    /// `POST /admin/config` contract (§6).
    pub fn merge_patch(&self, patch: &Value) -> Self {
        let mut value = serde_json::to_value(self.clone()).expect("AdminConfig always serializes");
        if let (Value::Object(base), Value::Object(patch)) = (&mut value, patch) {
            for (k, v) in patch {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value::<AdminConfig>(value)
            .unwrap_or_else(|_| self.clone())
            .clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_json_preserves_fields() {
        let cfg = AdminConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: AdminConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.default_bars, back.default_bars);
        assert_eq!(cfg.mix_sensitivity, back.mix_sensitivity);
    }

    #[test]
    fn bass_swap_intensity_clamped_to_unit_interval() {
        let mut cfg = AdminConfig::default();
        cfg.bass_swap_intensity = 5.0;
        let cfg = cfg.clamped();
        assert_eq!(cfg.bass_swap_intensity, 1.0);
    }

    #[test]
    fn merge_patch_leaves_unset_fields_unchanged() {
        let cfg = AdminConfig::default();
        let patch = serde_json::json!({ "mix_sensitivity": 0.9 });
        let merged = cfg.merge_patch(&patch);
        assert_eq!(merged.mix_sensitivity, 0.9);
        assert_eq!(merged.default_bars, cfg.default_bars);
        assert_eq!(merged.system_prompt, cfg.system_prompt);
    }
}
