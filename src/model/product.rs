use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub toode_id: u64,
    pub nimetus: String,
    pub kirjeldus: Option<String>,
    pub status_id: u64,
    pub image: Option<String>,
    pub hind: Decimal,
}

impl Product {
    pub fn is_bought_out(&self) -> bool {
        self.status_id == ProductStatus::BoughtOut.id()
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub nimetus: String,
    pub kirjeldus: Option<String>,
    pub status_id: u64,
    pub image: Option<String>,
    pub hind: Decimal,
}

/// Search filters for `/toode/search`; every field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Matches either the name or the description.
    pub q: Option<String>,
    pub nimetus: Option<String>,
    pub kirjeldus: Option<String>,
    pub status_id: Option<u64>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

/// Codes seeded into `status_toode`. The lookup table stays editable, but
/// these rows are the ones the service itself moves products between.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProductStatus {
    InStock = 1,
    Pawned = 2,
    Sold = 3,
    BoughtOut = 4,
}

impl ProductStatus {
    pub fn id(self) -> u64 {
        self as u64
    }

    /// `status_toode.nimetus` of the seeded row.
    pub fn seeded_name(self) -> &'static str {
        match self {
            ProductStatus::InStock => "Laos",
            ProductStatus::Pawned => "Pandis",
            ProductStatus::Sold => "Müüdud",
            ProductStatus::BoughtOut => "Välja ostetud",
        }
    }
}

/// Row of the `status_toode` lookup table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatusRow {
    pub status_id: u64,
    pub nimetus: String,
}
