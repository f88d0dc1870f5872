use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tariff_compare::tariffs::domain::{TYPICAL_ANNUAL_KWH, TYPICAL_POWER_KW};
use tariff_compare::tariffs::{
    Baseline, BandSplit, ConsumptionProfile, CustomerSegment, ProfileError, RankingOptions,
    ResultLimit, TariffDataset,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) dataset: Arc<TariffDataset>,
}

/// Consumer description shared by the HTTP payloads.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProfileRequest {
    #[serde(default = "typical_annual_kwh")]
    pub(crate) annual_kwh: f64,
    #[serde(default = "typical_power_kw")]
    pub(crate) committed_power_kw: f64,
    #[serde(default = "domestic")]
    pub(crate) segment: CustomerSegment,
    #[serde(default = "resident")]
    pub(crate) resident: bool,
    /// `"0.33,0.33,0.34"`; the configured split applies when absent.
    #[serde(default)]
    pub(crate) band_split: Option<String>,
}

impl ProfileRequest {
    pub(crate) fn into_profile(
        self,
        default_split: BandSplit,
    ) -> Result<ConsumptionProfile, ProfileError> {
        build_profile(
            self.annual_kwh,
            self.committed_power_kw,
            self.segment,
            self.resident,
            self.band_split.as_deref(),
            default_split,
        )
    }
}

pub(crate) fn build_profile(
    annual_kwh: f64,
    committed_power_kw: f64,
    segment: CustomerSegment,
    resident: bool,
    split: Option<&str>,
    default_split: BandSplit,
) -> Result<ConsumptionProfile, ProfileError> {
    let split = match split {
        Some(raw) => BandSplit::parse(raw)?,
        None => default_split,
    };
    ConsumptionProfile::new(annual_kwh, committed_power_kw, segment, resident, split)
}

/// Annual wins when both baselines are supplied.
pub(crate) fn ranking_options(
    baseline_annual: Option<f64>,
    baseline_monthly: Option<f64>,
    top: Option<usize>,
    all: bool,
) -> RankingOptions {
    let baseline = baseline_annual
        .map(Baseline::Annual)
        .or(baseline_monthly.map(Baseline::Monthly));
    let limit = match (all, top) {
        (true, _) => ResultLimit::All,
        (false, Some(n)) => ResultLimit::Top(n),
        (false, None) => ResultLimit::default(),
    };
    RankingOptions { baseline, limit }
}

fn typical_annual_kwh() -> f64 {
    TYPICAL_ANNUAL_KWH
}

fn typical_power_kw() -> f64 {
    TYPICAL_POWER_KW
}

fn domestic() -> CustomerSegment {
    CustomerSegment::Domestic
}

fn resident() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_to_typical_household() {
        let request: ProfileRequest = serde_json::from_str("{}").expect("empty payload parses");
        let profile = request
            .into_profile(BandSplit::default())
            .expect("defaults are valid");
        assert_eq!(profile.annual_kwh(), 2700.0);
        assert_eq!(profile.committed_power_kw(), 3.0);
        assert!(profile.is_domestic_resident());
    }

    #[test]
    fn invalid_split_is_rejected() {
        let request: ProfileRequest =
            serde_json::from_str(r#"{"annual_kwh": 1800, "band_split": "1,1,1"}"#)
                .expect("payload parses");
        assert!(request.into_profile(BandSplit::default()).is_err());
    }

    #[test]
    fn options_prefer_annual_baseline() {
        let options = ranking_options(Some(900.0), Some(80.0), Some(3), false);
        assert_eq!(options.baseline, Some(Baseline::Annual(900.0)));
        assert_eq!(options.limit, ResultLimit::Top(3));

        let options = ranking_options(None, Some(80.0), Some(3), true);
        assert_eq!(options.baseline, Some(Baseline::Monthly(80.0)));
        assert_eq!(options.limit, ResultLimit::All);
    }
}
