use anyhow::Result;
use std::collections::HashSet;
use std::fs;
use tempfile::tempdir;

use listing_pricer::app::preprocess_use_case::{preprocess, preprocess_with, PreprocessOptions};
use listing_pricer::app::training_use_case::prepare_training;
use listing_pricer::config::TrainingConfig;
use listing_pricer::pipeline::ingestion::read_clean_csv;
use listing_pricer::pipeline::{Pipeline, PreprocessArtifact};
use listing_pricer::types::{RawBatch, RawValue};

// Ten listings as the raw export writes them; row 4 lacks bedrooms and rating
const LISTINGS_CSV: &str = "\
price,room_type,neighbourhood_cleansed,accommodates,bedrooms,bathrooms_text,number_of_reviews,review_scores_rating,availability_365,minimum_nights
$100.00,Entire home/apt,Louvre,2,1,1 bath,10,4.5,100,2
$150.00,Private room,Opéra,1,1,1 bath,5,4.8,200,1
$200.00,Entire home/apt,Passy,4,2,2 baths,20,4.2,50,3
$80.00,Shared room,Louvre,1,,Half-bath,0,,365,1
$120.00,Private room,Opéra,2,1,1 bath,15,4.9,0,2
$95.00,Entire home/apt,Passy,3,1,1 bath,8,4.3,180,1
$175.00,Hotel room,Louvre,2,1,1 bath,3,4.7,90,2
$60.00,Private room,Opéra,1,1,1 bath,50,4.1,120,1
$300.00,Entire home/apt,Passy,6,3,2 baths,2,5.0,30,5
$110.00,Private room,Louvre,2,1,1 bath,12,4.6,75,2
";

const EXPECTED_COLUMNS: [&str; 10] = [
    "price",
    "room_type",
    "neighbourhood_cleansed",
    "accommodates",
    "bedrooms",
    "number_of_reviews",
    "review_scores_rating",
    "availability_365",
    "minimum_nights",
    "bathrooms",
];

#[test]
fn test_preprocess_writes_complete_numeric_table() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("listings.csv");
    let output = dir.path().join("processed/listings_clean.csv");
    fs::write(&input, LISTINGS_CSV)?;

    let processed = preprocess(&input, &output)?;
    assert!(output.exists(), "clean CSV was not written");
    assert_eq!(processed.table.len(), 10);

    let mut reader = csv::Reader::from_path(&output)?;
    let header: HashSet<String> = reader.headers()?.iter().map(str::to_string).collect();
    let expected: HashSet<String> = EXPECTED_COLUMNS.iter().map(|c| c.to_string()).collect();
    assert_eq!(header, expected);

    let mut rows = 0;
    for record in reader.records() {
        let record = record?;
        rows += 1;
        for cell in record.iter() {
            let value: f64 = cell.parse()?;
            assert!(value.is_finite(), "non-finite cell {cell}");
        }
        let price: f64 = record[0].parse()?;
        assert!(price > 0.0);
    }
    assert_eq!(rows, 10);
    Ok(())
}

#[test]
fn test_imputation_fills_missing_bedrooms_and_rating() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("listings.csv");
    let output = dir.path().join("clean.csv");
    fs::write(&input, LISTINGS_CSV)?;

    let processed = preprocess(&input, &output)?;
    let row = &processed.table.rows[3];
    assert_eq!(row.feature("bedrooms"), Some(1.0));
    // Median of the nine present ratings
    assert_eq!(row.feature("review_scores_rating"), Some(4.6));
    assert_eq!(row.feature("bathrooms"), Some(0.5));
    assert_eq!(processed.report.nulls_imputed["bedrooms"], 1);
    assert!(!processed.report.has_warnings());
    Ok(())
}

#[test]
fn test_clean_file_feeds_training_preparation() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("listings.csv");
    let output = dir.path().join("clean.csv");
    fs::write(&input, LISTINGS_CSV)?;
    preprocess(&input, &output)?;

    let table = read_clean_csv(&output)?;
    let prepared = prepare_training(&table, &TrainingConfig::default())?;
    let meta = &prepared.metadata;
    assert_eq!(meta.price_cap.rows_before, 10);
    // Only the 300 listing sits above the 99th percentile of ten prices
    assert_eq!(meta.price_cap.rows_after, 9);
    assert_eq!(meta.train_rows + meta.test_rows, 9);
    assert_eq!(meta.test_rows, 2);
    Ok(())
}

#[test]
fn test_frozen_artifact_reproduces_training_codes() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("listings.csv");
    let artifact_path = dir.path().join("artifacts/preprocess.json");
    fs::write(&input, LISTINGS_CSV)?;

    let fitted = preprocess_with(
        &input,
        &dir.path().join("clean.csv"),
        PreprocessOptions {
            frozen: None,
            artifact_out: Some(&artifact_path),
        },
    )?;
    let artifact = PreprocessArtifact::load(&artifact_path)?;
    assert!(artifact.matches_feature_order());

    // One Passy hotel listing, no price, missing bedrooms
    let single = RawBatch::from_columns(vec![
        ("room_type", vec![RawValue::from("Hotel room")]),
        ("neighbourhood_cleansed", vec![RawValue::from("Passy")]),
        ("accommodates", vec![RawValue::from("2")]),
        ("bedrooms", vec![RawValue::Null]),
        ("bathrooms_text", vec![RawValue::from("1 bath")]),
        ("number_of_reviews", vec![RawValue::from("3")]),
        ("review_scores_rating", vec![RawValue::from("4.7")]),
        ("availability_365", vec![RawValue::from("90")]),
        ("minimum_nights", vec![RawValue::from("2")]),
    ]);
    let scored = Pipeline::frozen(artifact)?.process(&single)?;
    let row = &scored.table.rows[0];

    let hotel = &fitted.table.rows[6];
    let passy = &fitted.table.rows[2];
    assert_eq!(row.feature("room_type"), hotel.feature("room_type"));
    assert_eq!(row.feature("neighbourhood_cleansed"), passy.feature("neighbourhood_cleansed"));
    assert_eq!(row.feature("bedrooms"), Some(fitted.report.fill_values["bedrooms"]));
    assert!(row.price.is_none());
    Ok(())
}
