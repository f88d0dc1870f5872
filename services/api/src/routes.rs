use crate::infra::{ranking_options, AppState, ProfileRequest};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tariff_compare::error::AppError;
use tariff_compare::tariffs::report::{quote_view, ranking_report, OfferQuoteView, RankingReport};

#[derive(Debug, Deserialize)]
pub(crate) struct RankRequest {
    #[serde(flatten)]
    pub(crate) profile: ProfileRequest,
    #[serde(default)]
    pub(crate) baseline_annual: Option<f64>,
    #[serde(default)]
    pub(crate) baseline_monthly: Option<f64>,
    #[serde(default)]
    pub(crate) top: Option<usize>,
    #[serde(default)]
    pub(crate) all: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuoteRequest {
    pub(crate) code: String,
    #[serde(flatten)]
    pub(crate) profile: ProfileRequest,
}

pub(crate) fn router() -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/offers/rank", axum::routing::post(rank_endpoint))
        .route("/api/v1/offers/quote", axum::routing::post(quote_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready", "offers": state.dataset.catalog.len() })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Segment without offers is a normal answer, reported through `status`.
pub(crate) async fn rank_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<RankRequest>,
) -> Result<Json<RankingReport>, AppError> {
    let RankRequest {
        profile,
        baseline_annual,
        baseline_monthly,
        top,
        all,
    } = payload;

    let dataset = Arc::clone(&state.dataset);
    let profile = profile.into_profile(dataset.band_split)?;
    let options = ranking_options(baseline_annual, baseline_monthly, top, all);

    // Pricing fans out on the rayon pool; keep it off the async workers.
    let report = tokio::task::spawn_blocking(move || {
        let outcome = dataset.rank(&profile, &options);
        ranking_report(&outcome, &options, &dataset.market_index)
    })
    .await?;
    Ok(Json(report))
}

pub(crate) async fn quote_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<QuoteRequest>,
) -> Result<Json<OfferQuoteView>, AppError> {
    let dataset = state.dataset.as_ref();
    let profile = payload.profile.into_profile(dataset.band_split)?;
    let (offer, breakdown) = dataset.quote(&payload.code, &profile)?;
    Ok(Json(quote_view(offer, &breakdown)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tariff_compare::tariffs::domain::BandPrices;
    use tariff_compare::tariffs::parameters::keys;
    use tariff_compare::tariffs::{
        Band, CustomerSegment, MarketIndexAverages, Offer, OfferCatalog, PriceType,
        RegulatoryParameters, TariffDataset,
    };
    use tower::ServiceExt;

    fn offer(code: &str, price: f64, segment: CustomerSegment) -> Offer {
        let mut offer = Offer::new(format!("Offerta {code}"), code, segment, PriceType::Fixed);
        offer.fixed_commercial_fee = 96.0;
        offer.energy_price = BandPrices::from([(Band::F0, price)]);
        offer
    }

    fn state() -> AppState {
        let catalog = OfferCatalog::new(vec![
            offer("CASA-1", 0.14, CustomerSegment::Domestic),
            offer("CASA-2", 0.12, CustomerSegment::Domestic),
        ]);
        let parameters = RegulatoryParameters::from_pairs([(keys::SIGMA1, 20.0)]);
        let dataset = TariffDataset::new(catalog, parameters, MarketIndexAverages::fallback());

        AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            dataset: Arc::new(dataset),
        }
    }

    fn rank_request(json: &str) -> RankRequest {
        serde_json::from_str(json).expect("request parses")
    }

    #[tokio::test]
    async fn rank_endpoint_orders_cheapest_first() {
        let request = rank_request(r#"{"annual_kwh": 2000, "baseline_monthly": 60, "all": true}"#);

        let Json(report) = rank_endpoint(Extension(state()), Json(request))
            .await
            .expect("ranking builds");

        match report {
            RankingReport::Ranked { offers, evaluated, .. } => {
                assert_eq!(evaluated, 2);
                assert_eq!(offers[0].quote.code, "CASA-2");
                assert_eq!(offers[0].position, 1);
                assert!(offers[0].savings.is_some());
            }
            other => panic!("expected a ranking, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rank_endpoint_reports_empty_segment() {
        let request = rank_request(r#"{"segment": "business", "committed_power_kw": 6}"#);

        let Json(report) = rank_endpoint(Extension(state()), Json(request))
            .await
            .expect("empty segment is not an error");

        let json = serde_json::to_value(&report).expect("report serializes");
        assert_eq!(json["status"], "no_offers_for_segment");
    }

    #[tokio::test]
    async fn rank_endpoint_rejects_invalid_profile() {
        let request = rank_request(r#"{"annual_kwh": -5}"#);

        let error = rank_endpoint(Extension(state()), Json(request))
            .await
            .expect_err("negative consumption is rejected");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn rank_route_answers_from_blocking_pool() {
        let response = router()
            .layer(Extension(state()))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/offers/rank")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"annual_kwh": 2000, "all": true}"#))
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn quote_endpoint_prices_one_offer() {
        let request: QuoteRequest =
            serde_json::from_str(r#"{"code": "CASA-1", "annual_kwh": 1000}"#)
                .expect("request parses");

        let Json(view) = quote_endpoint(Extension(state()), Json(request))
            .await
            .expect("quote builds");

        assert_eq!(view.code, "CASA-1");
        assert_eq!(view.breakdown.commodity, 140.0);
        assert_eq!(view.breakdown.network, 20.0);
    }

    #[tokio::test]
    async fn quote_endpoint_reports_unknown_offer() {
        let response = router()
            .layer(Extension(state()))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/offers/quote")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"code": "MISSING"}"#))
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn readiness_reflects_flag() {
        let response = router()
            .layer(Extension(state()))
            .oneshot(
                Request::builder()
                    .uri("/ready")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
    }
}
