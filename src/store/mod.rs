//! Data access for every registry, behind one object built at startup.

use async_trait::async_trait;
use chrono::NaiveDate;
use derive_more::Display;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::model::{
    client::{Client, NewClient},
    contract::{Contract, ContractDetail, ContractFilter, ContractPatch, NewContract},
    employee::{Employee, NewEmployee},
    product::{NewProduct, Product, ProductFilter, StatusRow},
};

#[cfg(test)]
pub mod memory;
pub mod mysql;

#[cfg(test)]
pub use memory::MemoryStore;
pub use mysql::MySqlStore;

#[derive(Debug, Display)]
pub enum StoreError {
    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),

    #[display(fmt = "client not found")]
    ClientNotFound,

    #[display(fmt = "client is blocked")]
    ClientBlocked,

    #[display(fmt = "product is already bought out")]
    AlreadyBoughtOut,

    #[display(fmt = "referenced record does not exist")]
    InvalidReference,

    #[display(fmt = "duplicate kood")]
    Duplicate,

    #[display(fmt = "record is still referenced")]
    InUse,

    #[display(fmt = "database error: {}", _0)]
    Database(sqlx::Error),

    /// Raised only by the in-memory store's failure switch.
    #[cfg_attr(not(test), allow(dead_code))]
    #[display(fmt = "injected failure: {}", _0)]
    Injected(&'static str),
}

impl std::error::Error for StoreError {}

impl StoreError {
    /// Maps MySQL constraint-violation error numbers.
    fn from_mysql_number(number: u16) -> Option<Self> {
        match number {
            1062 => Some(StoreError::Duplicate),
            1451 => Some(StoreError::InUse),
            1452 => Some(StoreError::InvalidReference),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if let Some(mapped) = db_err
                .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                .and_then(|mysql| Self::from_mysql_number(mysql.number()))
            {
                return mapped;
            }
        }
        StoreError::Database(e)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 1-based page request, already validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub limit: u64,
}

impl Page {
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub data: Vec<T>,
}

impl<T> Paged<T> {
    pub fn new(data: Vec<T>, total: u64, page: Page) -> Self {
        Self {
            total,
            page: page.page,
            page_size: page.limit,
            total_pages: total.div_ceil(page.limit),
            data,
        }
    }
}

/// Result of a buyout: the updated product and, if it had one, its latest contract.
#[derive(Debug, Clone, Serialize)]
pub struct Buyout {
    pub toode: Product,
    pub leping: Option<Contract>,
}

#[async_trait]
pub trait PawnStore: Send + Sync {
    // clients
    async fn list_clients(&self, page: Page) -> StoreResult<Paged<Client>>;
    async fn search_clients(&self, term: &str) -> StoreResult<Vec<Client>>;
    async fn autocomplete_clients(&self, term: &str) -> StoreResult<Vec<Client>>;
    async fn get_client(&self, id: u64) -> StoreResult<Option<Client>>;
    async fn client_id_by_kood(&self, kood: &str) -> StoreResult<Option<u64>>;
    async fn insert_client(&self, client: NewClient) -> StoreResult<Client>;
    async fn update_client(&self, client: &Client) -> StoreResult<()>;
    async fn delete_client(&self, id: u64) -> StoreResult<Option<Client>>;
    /// Every stored client kood with its owner, streamed for index warmup.
    fn client_koods(&self) -> BoxStream<'_, StoreResult<(String, u64)>>;

    // product status lookup
    async fn list_statuses(&self) -> StoreResult<Vec<StatusRow>>;
    async fn get_status(&self, id: u64) -> StoreResult<Option<StatusRow>>;
    async fn insert_status(&self, nimetus: &str) -> StoreResult<StatusRow>;
    async fn update_status(&self, status: &StatusRow) -> StoreResult<()>;
    async fn delete_status(&self, id: u64) -> StoreResult<bool>;

    // products
    async fn list_products(&self, page: Page) -> StoreResult<Paged<Product>>;
    async fn search_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>>;
    async fn autocomplete_products(&self, term: &str) -> StoreResult<Vec<Product>>;
    async fn products_by_status(&self, status_id: u64) -> StoreResult<Vec<Product>>;
    /// Products whose status row is named `nimetus`.
    async fn products_by_status_name(&self, nimetus: &str) -> StoreResult<Vec<Product>>;
    async fn get_product(&self, id: u64) -> StoreResult<Option<Product>>;
    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product>;
    async fn update_product(&self, product: &Product) -> StoreResult<()>;
    async fn delete_product(&self, id: u64) -> StoreResult<bool>;

    /// Moves the product to "bought out" and redeems its latest contract,
    /// both or neither.
    async fn buyout_product(&self, id: u64, today: NaiveDate) -> StoreResult<Buyout>;

    // employees
    async fn list_employees(&self, page: Page) -> StoreResult<Paged<Employee>>;
    async fn search_employees(&self, term: &str) -> StoreResult<Vec<Employee>>;
    async fn get_employee(&self, id: u64) -> StoreResult<Option<Employee>>;
    async fn employee_by_kood(&self, kood: &str) -> StoreResult<Option<Employee>>;
    async fn insert_employee(&self, employee: NewEmployee) -> StoreResult<Employee>;
    async fn update_employee(&self, employee: &Employee) -> StoreResult<()>;
    async fn delete_employee(&self, id: u64) -> StoreResult<Option<Employee>>;
    fn employee_koods(&self) -> BoxStream<'_, StoreResult<(String, u64)>>;

    // contracts
    async fn list_contracts(&self, page: Page) -> StoreResult<Paged<ContractDetail>>;
    async fn search_contracts(
        &self,
        filter: &ContractFilter,
        page: Page,
    ) -> StoreResult<Paged<ContractDetail>>;
    async fn get_contract(&self, id: u64) -> StoreResult<Option<Contract>>;
    async fn contract_detail(&self, id: u64) -> StoreResult<Option<ContractDetail>>;

    /// Inserts a contract unless its client is missing or blocked.
    async fn create_contract(&self, contract: NewContract) -> StoreResult<Contract>;
    async fn update_contract(&self, id: u64, patch: &ContractPatch) -> StoreResult<Contract>;
    async fn delete_contract(&self, id: u64) -> StoreResult<bool>;
}
