/// Column name constants for the listing schema.
/// Raw input columns and clean output columns share names except for
/// `bathrooms_text`, which is replaced by the numeric `bathrooms`.

// Target
pub const PRICE: &str = "price";

// Categorical columns
pub const ROOM_TYPE: &str = "room_type";
pub const NEIGHBOURHOOD: &str = "neighbourhood_cleansed";

// Numeric text columns
pub const ACCOMMODATES: &str = "accommodates";
pub const BEDROOMS: &str = "bedrooms";
pub const NUMBER_OF_REVIEWS: &str = "number_of_reviews";
pub const REVIEW_SCORES_RATING: &str = "review_scores_rating";
pub const AVAILABILITY_365: &str = "availability_365";
pub const MINIMUM_NIGHTS: &str = "minimum_nights";

// Free-text unit column and the numeric column it becomes
pub const BATHROOMS_TEXT: &str = "bathrooms_text";
pub const BATHROOMS: &str = "bathrooms";

/// Number of model features in a clean row.
pub const FEATURE_COUNT: usize = 9;

/// The order in which features are handed to a model. Training output and
/// serving input both follow this order.
pub const FEATURE_ORDER: [&str; FEATURE_COUNT] = [
    ROOM_TYPE,
    NEIGHBOURHOOD,
    ACCOMMODATES,
    BEDROOMS,
    BATHROOMS,
    NUMBER_OF_REVIEWS,
    REVIEW_SCORES_RATING,
    AVAILABILITY_365,
    MINIMUM_NIGHTS,
];

/// Columns encoded through the vocabulary.
pub const CATEGORICAL_COLUMNS: [&str; 2] = [ROOM_TYPE, NEIGHBOURHOOD];

/// Columns coerced with plain numeric parsing.
pub const NUMERIC_COLUMNS: [&str; 6] = [
    ACCOMMODATES,
    BEDROOMS,
    NUMBER_OF_REVIEWS,
    REVIEW_SCORES_RATING,
    AVAILABILITY_365,
    MINIMUM_NIGHTS,
];

/// Every numeric feature that goes through imputation, in feature order.
pub const IMPUTED_COLUMNS: [&str; 7] = [
    ACCOMMODATES,
    BEDROOMS,
    BATHROOMS,
    NUMBER_OF_REVIEWS,
    REVIEW_SCORES_RATING,
    AVAILABILITY_365,
    MINIMUM_NIGHTS,
];

/// Raw columns a batch must carry regardless of mode.
pub const REQUIRED_FEATURE_COLUMNS: [&str; 9] = [
    ROOM_TYPE,
    NEIGHBOURHOOD,
    ACCOMMODATES,
    BEDROOMS,
    BATHROOMS_TEXT,
    NUMBER_OF_REVIEWS,
    REVIEW_SCORES_RATING,
    AVAILABILITY_365,
    MINIMUM_NIGHTS,
];

/// Raw field values read as null, matching the markers pandas treats as NaN.
pub const NULL_MARKERS: [&str; 17] = [
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "<NA>", "#N/A",
    "#NA", "#N/A N/A", "-1.#IND", "1.#QNAN",
];

// Model registry defaults
pub const DEFAULT_MODEL_NAME: &str = "listing-price-predictor";
pub const DEFAULT_MODEL_URI: &str = "models:/listing-price-predictor@champion";
pub const DEFAULT_REGISTRY_ROOT: &str = "registry";

// Training defaults
pub const DEFAULT_OUTLIER_QUANTILE: f64 = 0.99;
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

pub const DEFAULT_PORT: u16 = 8000;

/// Position of a feature inside [`FEATURE_ORDER`].
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_ORDER.iter().position(|f| *f == name)
}
