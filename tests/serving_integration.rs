use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

use listing_pricer::app::ports::{ModelLoaderPort, ModelRegistryPort};
use listing_pricer::app::predict_use_case::{predict, PredictUseCase};
use listing_pricer::constants::FEATURE_ORDER;
use listing_pricer::error::PredictError;
use listing_pricer::infra::{FsModelRegistry, ModelCache};
use listing_pricer::model::{ModelArtifact, ModelKind, ModelRef, RegressionTree, TreeNode};
use listing_pricer::pipeline::Pipeline;
use listing_pricer::server::{create_server, AppState};
use listing_pricer::types::{RawBatch, RawValue};

const MODEL_NAME: &str = "listing-price-predictor";
const CHAMPION: &str = "models:/listing-price-predictor@champion";

/// One tree splitting on accommodates at 3: small listings 80, larger 200.
fn tree_model() -> ModelArtifact {
    let tree = RegressionTree {
        nodes: vec![
            TreeNode::split(2, 3.0, 1, 2),
            TreeNode::leaf(80.0_f64.ln_1p()),
            TreeNode::leaf(200.0_f64.ln_1p()),
        ],
    };
    ModelArtifact::new(
        MODEL_NAME,
        ModelKind::TreeEnsemble {
            base_score: 0.0,
            trees: vec![tree],
        },
        None,
    )
}

fn features(accommodates: f64) -> BTreeMap<String, f64> {
    FEATURE_ORDER
        .iter()
        .map(|f| {
            let v = if *f == "accommodates" { accommodates } else { 1.0 };
            (f.to_string(), v)
        })
        .collect()
}

fn column(values: &[Option<&str>]) -> Vec<RawValue> {
    values.iter().map(|v| RawValue::from(*v)).collect()
}

fn raw_listings() -> RawBatch {
    RawBatch::from_columns(vec![
        ("price", column(&[Some("$100.00"), Some("$150.00"), Some("$220.00")])),
        ("room_type", column(&[Some("Private room"), Some("Entire home/apt"), Some("Entire home/apt")])),
        ("neighbourhood_cleansed", column(&[Some("Louvre"), Some("Opéra"), Some("Passy")])),
        ("accommodates", column(&[Some("2"), Some("4"), Some("6")])),
        ("bedrooms", column(&[Some("1"), Some("2"), Some("3")])),
        ("bathrooms_text", column(&[Some("1 bath"), Some("1 bath"), Some("2 baths")])),
        ("number_of_reviews", column(&[Some("10"), Some("4"), Some("2")])),
        ("review_scores_rating", column(&[Some("4.5"), Some("4.8"), Some("5.0")])),
        ("availability_365", column(&[Some("100"), Some("30"), Some("60")])),
        ("minimum_nights", column(&[Some("2"), Some("1"), Some("3")])),
    ])
}

async fn champion_registry(root: &std::path::Path) -> Result<Arc<FsModelRegistry>> {
    let registry = Arc::new(FsModelRegistry::new(root));
    let version = registry.register(tree_model()).await?;
    registry.set_alias(MODEL_NAME, "champion", version).await?;
    Ok(registry)
}

#[tokio::test]
async fn test_predict_through_registry_alias() -> Result<()> {
    let dir = tempdir()?;
    let registry = champion_registry(dir.path()).await?;
    let loader: Arc<dyn ModelLoaderPort> = Arc::new(ModelCache::new(registry));

    let small = predict(&features(2.0), CHAMPION, loader.clone()).await?;
    let large = predict(&features(5.0), CHAMPION, loader).await?;
    assert!((small - 80.0).abs() < 1e-6);
    assert!((large - 200.0).abs() < 1e-6);
    Ok(())
}

#[tokio::test]
async fn test_moving_alias_needs_cache_invalidation() -> Result<()> {
    let dir = tempdir()?;
    let registry = champion_registry(dir.path()).await?;
    let cache = Arc::new(ModelCache::new(registry.clone()));
    let use_case = PredictUseCase::new(cache.clone());

    assert!((use_case.predict(&features(2.0), CHAMPION).await? - 80.0).abs() < 1e-6);

    let mut flat = tree_model();
    flat.model = ModelKind::Linear {
        intercept: 50.0_f64.ln_1p(),
        coefficients: vec![0.0; 9],
    };
    let v2 = registry.register(flat).await?;
    registry.set_alias(MODEL_NAME, "champion", v2).await?;

    // Still served from cache
    assert!((use_case.predict(&features(2.0), CHAMPION).await? - 80.0).abs() < 1e-6);
    cache.invalidate(None).await;
    assert!((use_case.predict(&features(2.0), CHAMPION).await? - 50.0).abs() < 1e-6);
    Ok(())
}

#[tokio::test]
async fn test_unregistered_model_is_unavailable() -> Result<()> {
    let dir = tempdir()?;
    let registry = Arc::new(FsModelRegistry::new(dir.path()));
    let loader: Arc<dyn ModelLoaderPort> = Arc::new(ModelCache::new(registry));

    let err = predict(&features(2.0), CHAMPION, loader).await.unwrap_err();
    assert!(matches!(err, PredictError::ModelUnavailable(_)));
    assert!(err.to_string().contains("model not found"));
    Ok(())
}

#[tokio::test]
async fn test_http_predict_against_registered_model() -> Result<()> {
    let dir = tempdir()?;
    let registry = champion_registry(dir.path()).await?;
    let router = create_server(AppState {
        predictor: Arc::new(PredictUseCase::new(Arc::new(ModelCache::new(registry)))),
        model_uri: CHAMPION.to_string(),
    });

    let body = serde_json::json!({
        "room_type": 1, "neighbourhood_cleansed": 3, "accommodates": 6,
        "bedrooms": 3, "bathrooms": 2.0, "number_of_reviews": 2,
        "review_scores_rating": 5.0, "availability_365": 30, "minimum_nights": 5
    });
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = hyper::body::to_bytes(response.into_body()).await?;
    let json: serde_json::Value = serde_json::from_slice(&bytes)?;
    let price = json["predicted_price"].as_f64().unwrap_or_default();
    assert!((price - 200.0).abs() < 1e-6);
    Ok(())
}

#[tokio::test]
async fn test_bundled_preprocessing_scores_raw_listings() -> Result<()> {
    let dir = tempdir()?;
    let fitted = Pipeline::fit().process(&raw_listings())?;
    let mut model = tree_model();
    model.attach_preprocessing(fitted.artifact.clone())?;

    let registry = Arc::new(FsModelRegistry::new(dir.path()));
    let version = registry.register(model).await?;
    registry.set_alias(MODEL_NAME, "champion", version).await?;
    let stored = registry.load(&ModelRef::parse(CHAMPION)?).await?;
    assert_eq!(stored.preprocessing.as_ref(), Some(&fitted.artifact));

    let use_case = PredictUseCase::new(Arc::new(ModelCache::new(registry)));

    // No price, bedrooms missing: the bundled medians fill it
    let single = RawBatch::from_columns(vec![
        ("room_type", column(&[Some("Entire home/apt"), Some("Private room")])),
        ("neighbourhood_cleansed", column(&[Some("Passy"), Some("Louvre")])),
        ("accommodates", column(&[Some("5"), Some("2")])),
        ("bedrooms", column(&[None, Some("1")])),
        ("bathrooms_text", column(&[Some("2 baths"), Some("Half-bath")])),
        ("number_of_reviews", column(&[Some("3"), Some("7")])),
        ("review_scores_rating", column(&[Some("4.9"), None])),
        ("availability_365", column(&[Some("90"), Some("10")])),
        ("minimum_nights", column(&[Some("2"), Some("1")])),
    ]);
    let prices = use_case.predict_listings(&single, CHAMPION).await?;
    assert_eq!(prices.len(), 2);
    assert!((prices[0] - 200.0).abs() < 1e-6);
    assert!((prices[1] - 80.0).abs() < 1e-6);

    // Hand-encoding the first listing with the stored vocabulary gives the same price
    let vocabulary = &fitted.artifact.vocabulary;
    let mut encoded = features(5.0);
    for (name, value) in [("room_type", "Entire home/apt"), ("neighbourhood_cleansed", "Passy")] {
        let code = vocabulary.code(name, value).map(f64::from).unwrap_or(-1.0);
        encoded.insert(name.to_string(), code);
    }
    encoded.insert("bedrooms".to_string(), fitted.artifact.imputation_medians["bedrooms"]);
    let direct = use_case.predict(&encoded, CHAMPION).await?;
    assert_eq!(prices[0], direct);
    Ok(())
}

#[tokio::test]
async fn test_unknown_category_in_raw_listing_fails_scoring() -> Result<()> {
    let dir = tempdir()?;
    let mut model = tree_model();
    model.attach_preprocessing(Pipeline::fit().process(&raw_listings())?.artifact)?;
    let registry = Arc::new(FsModelRegistry::new(dir.path()));
    let version = registry.register(model).await?;
    registry.set_alias(MODEL_NAME, "champion", version).await?;
    let use_case = PredictUseCase::new(Arc::new(ModelCache::new(registry)));

    let mut single = raw_listings();
    single.rows.truncate(1);
    single.rows[0].insert("neighbourhood_cleansed".to_string(), RawValue::from("Montmartre"));
    let err = use_case.predict_listings(&single, CHAMPION).await.unwrap_err();
    assert!(matches!(err, PredictError::Schema(_)));
    Ok(())
}
