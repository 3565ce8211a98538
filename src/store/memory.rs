use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{Buyout, Page, Paged, PawnStore, StoreError, StoreResult};
use crate::model::{
    client::{Client, NewClient},
    contract::{
        ClientSummary, Contract, ContractDetail, ContractFilter, ContractPatch, EmployeeSummary,
        NewContract, ProductSummary,
    },
    employee::{Employee, NewEmployee},
    product::{NewProduct, Product, ProductFilter, ProductStatus, StatusRow},
};

const AUTOCOMPLETE_LIMIT: usize = 10;

#[derive(Default)]
struct State {
    clients: BTreeMap<u64, Client>,
    statuses: BTreeMap<u64, StatusRow>,
    products: BTreeMap<u64, Product>,
    employees: BTreeMap<u64, Employee>,
    contracts: BTreeMap<u64, Contract>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn detail(&self, contract: &Contract) -> Option<ContractDetail> {
        let client = self.clients.get(&contract.klient_id)?;
        let product = self.products.get(&contract.toode_id)?;
        let employee = self.employees.get(&contract.tootaja_id)?;

        Some(ContractDetail {
            leping: contract.clone(),
            klient: ClientSummary {
                nimi: client.nimi.clone(),
                perekonnanimi: client.perekonnanimi.clone(),
                kood: client.kood.clone(),
                tel: client.tel.clone(),
                aadres: client.aadres.clone(),
            },
            toode: ProductSummary {
                nimetus: product.nimetus.clone(),
                kirjeldus: product.kirjeldus.clone(),
                image: product.image.clone(),
                hind: product.hind,
            },
            tootaja: EmployeeSummary {
                nimi: employee.nimi.clone(),
                perekonnanimi: employee.perekonnanimi.clone(),
            },
        })
    }

    /// The gate every contract write passes through.
    fn check_contract_refs(
        &self,
        klient_id: u64,
        toode_id: u64,
        tootaja_id: u64,
    ) -> StoreResult<()> {
        let client = self
            .clients
            .get(&klient_id)
            .ok_or(StoreError::ClientNotFound)?;
        if client.is_blocked() {
            return Err(StoreError::ClientBlocked);
        }
        if !self.products.contains_key(&toode_id) || !self.employees.contains_key(&tootaja_id) {
            return Err(StoreError::InvalidReference);
        }
        Ok(())
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn paginate<T: Clone>(rows: Vec<T>, page: Page) -> Paged<T> {
    let total = rows.len() as u64;
    let data = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();
    Paged::new(data, total, page)
}

/// Process-local store with the same transactional guarantees as MySQL:
/// each operation runs under one lock and stages its writes before
/// publishing them.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_contract_writes: AtomicBool,
}

impl MemoryStore {
    /// Store with the well-known product statuses seeded.
    pub fn new() -> Self {
        let store = Self::default();
        {
            let mut state = store.lock();
            for status in [
                ProductStatus::InStock,
                ProductStatus::Pawned,
                ProductStatus::Sold,
                ProductStatus::BoughtOut,
            ] {
                state.statuses.insert(
                    status.id(),
                    StatusRow {
                        status_id: status.id(),
                        nimetus: status.seeded_name().to_string(),
                    },
                );
            }
            state.next_id = 100;
        }
        store
    }

    /// Makes every later contract write fail, to exercise rollback.
    pub fn fail_contract_writes(&self, fail: bool) {
        self.fail_contract_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn contract_write_allowed(&self) -> StoreResult<()> {
        if self.fail_contract_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Injected("contract write"));
        }
        Ok(())
    }
}

#[async_trait]
impl PawnStore for MemoryStore {
    async fn list_clients(&self, page: Page) -> StoreResult<Paged<Client>> {
        let state = self.lock();
        let rows = state.clients.values().rev().cloned().collect();
        Ok(paginate(rows, page))
    }

    async fn search_clients(&self, term: &str) -> StoreResult<Vec<Client>> {
        let state = self.lock();
        Ok(state
            .clients
            .values()
            .filter(|c| {
                contains(&c.nimi, term) || contains(&c.perekonnanimi, term) || c.kood.contains(term)
            })
            .cloned()
            .collect())
    }

    async fn autocomplete_clients(&self, term: &str) -> StoreResult<Vec<Client>> {
        let state = self.lock();
        let id = term.parse::<u64>().ok();
        Ok(state
            .clients
            .values()
            .filter(|c| {
                Some(c.klient_id) == id
                    || contains(&c.nimi, term)
                    || contains(&c.perekonnanimi, term)
                    || contains(&c.kood, term)
            })
            .take(AUTOCOMPLETE_LIMIT)
            .cloned()
            .collect())
    }

    async fn get_client(&self, id: u64) -> StoreResult<Option<Client>> {
        Ok(self.lock().clients.get(&id).cloned())
    }

    async fn client_id_by_kood(&self, kood: &str) -> StoreResult<Option<u64>> {
        Ok(self
            .lock()
            .clients
            .values()
            .find(|c| c.kood == kood)
            .map(|c| c.klient_id))
    }

    async fn insert_client(&self, client: NewClient) -> StoreResult<Client> {
        let mut state = self.lock();
        if state.clients.values().any(|c| c.kood == client.kood) {
            return Err(StoreError::Duplicate);
        }

        let row = Client {
            klient_id: state.next_id(),
            nimi: client.nimi,
            perekonnanimi: client.perekonnanimi,
            kood: client.kood,
            tel: client.tel,
            aadres: client.aadres,
            status: Some(client.status.to_string()),
        };
        state.clients.insert(row.klient_id, row.clone());
        Ok(row)
    }

    async fn update_client(&self, client: &Client) -> StoreResult<()> {
        let mut state = self.lock();
        if !state.clients.contains_key(&client.klient_id) {
            return Err(StoreError::NotFound("Client"));
        }
        if state
            .clients
            .values()
            .any(|c| c.kood == client.kood && c.klient_id != client.klient_id)
        {
            return Err(StoreError::Duplicate);
        }
        state.clients.insert(client.klient_id, client.clone());
        Ok(())
    }

    async fn delete_client(&self, id: u64) -> StoreResult<Option<Client>> {
        let mut state = self.lock();
        if state.contracts.values().any(|c| c.klient_id == id) {
            return Err(StoreError::InUse);
        }
        Ok(state.clients.remove(&id))
    }

    fn client_koods(&self) -> BoxStream<'_, StoreResult<(String, u64)>> {
        let rows: Vec<_> = self
            .lock()
            .clients
            .values()
            .map(|c| Ok((c.kood.clone(), c.klient_id)))
            .collect();
        stream::iter(rows).boxed()
    }

    async fn list_statuses(&self) -> StoreResult<Vec<StatusRow>> {
        Ok(self.lock().statuses.values().cloned().collect())
    }

    async fn get_status(&self, id: u64) -> StoreResult<Option<StatusRow>> {
        Ok(self.lock().statuses.get(&id).cloned())
    }

    async fn insert_status(&self, nimetus: &str) -> StoreResult<StatusRow> {
        let mut state = self.lock();
        let row = StatusRow {
            status_id: state.next_id(),
            nimetus: nimetus.to_string(),
        };
        state.statuses.insert(row.status_id, row.clone());
        Ok(row)
    }

    async fn update_status(&self, status: &StatusRow) -> StoreResult<()> {
        let mut state = self.lock();
        match state.statuses.get_mut(&status.status_id) {
            Some(row) => {
                *row = status.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound("Status")),
        }
    }

    async fn delete_status(&self, id: u64) -> StoreResult<bool> {
        let mut state = self.lock();
        if state.products.values().any(|p| p.status_id == id) {
            return Err(StoreError::InUse);
        }
        Ok(state.statuses.remove(&id).is_some())
    }

    async fn list_products(&self, page: Page) -> StoreResult<Paged<Product>> {
        let state = self.lock();
        let rows = state.products.values().cloned().collect();
        Ok(paginate(rows, page))
    }

    async fn search_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let state = self.lock();
        let description = |p: &Product| p.kirjeldus.clone().unwrap_or_default();

        Ok(state
            .products
            .values()
            .filter(|p| {
                filter
                    .q
                    .as_deref()
                    .is_none_or(|q| contains(&p.nimetus, q) || contains(&description(p), q))
            })
            .filter(|p| filter.nimetus.as_deref().is_none_or(|n| contains(&p.nimetus, n)))
            .filter(|p| {
                filter
                    .kirjeldus
                    .as_deref()
                    .is_none_or(|k| contains(&description(p), k))
            })
            .filter(|p| filter.status_id.is_none_or(|s| p.status_id == s))
            .filter(|p| filter.min_price.is_none_or(|min| p.hind >= min))
            .filter(|p| filter.max_price.is_none_or(|max| p.hind <= max))
            .cloned()
            .collect())
    }

    async fn autocomplete_products(&self, term: &str) -> StoreResult<Vec<Product>> {
        let state = self.lock();
        let id = term.parse::<u64>().ok();
        Ok(state
            .products
            .values()
            .filter(|p| Some(p.toode_id) == id || contains(&p.nimetus, term))
            .take(AUTOCOMPLETE_LIMIT)
            .cloned()
            .collect())
    }

    async fn products_by_status(&self, status_id: u64) -> StoreResult<Vec<Product>> {
        Ok(self
            .lock()
            .products
            .values()
            .filter(|p| p.status_id == status_id)
            .cloned()
            .collect())
    }

    async fn products_by_status_name(&self, nimetus: &str) -> StoreResult<Vec<Product>> {
        let state = self.lock();
        let ids: Vec<u64> = state
            .statuses
            .values()
            .filter(|s| s.nimetus == nimetus)
            .map(|s| s.status_id)
            .collect();
        Ok(state
            .products
            .values()
            .filter(|p| ids.contains(&p.status_id))
            .cloned()
            .collect())
    }

    async fn get_product(&self, id: u64) -> StoreResult<Option<Product>> {
        Ok(self.lock().products.get(&id).cloned())
    }

    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        let mut state = self.lock();
        if !state.statuses.contains_key(&product.status_id) {
            return Err(StoreError::InvalidReference);
        }

        let row = Product {
            toode_id: state.next_id(),
            nimetus: product.nimetus,
            kirjeldus: product.kirjeldus,
            status_id: product.status_id,
            image: product.image,
            hind: product.hind,
        };
        state.products.insert(row.toode_id, row.clone());
        Ok(row)
    }

    async fn update_product(&self, product: &Product) -> StoreResult<()> {
        let mut state = self.lock();
        if !state.statuses.contains_key(&product.status_id) {
            return Err(StoreError::InvalidReference);
        }
        match state.products.get_mut(&product.toode_id) {
            Some(row) => {
                *row = product.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound("Product")),
        }
    }

    async fn delete_product(&self, id: u64) -> StoreResult<bool> {
        let mut state = self.lock();
        if state.contracts.values().any(|c| c.toode_id == id) {
            return Err(StoreError::InUse);
        }
        Ok(state.products.remove(&id).is_some())
    }

    async fn buyout_product(&self, id: u64, today: NaiveDate) -> StoreResult<Buyout> {
        let mut state = self.lock();

        let mut product = state
            .products
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("Product"))?;
        if product.is_bought_out() {
            return Err(StoreError::AlreadyBoughtOut);
        }
        product.status_id = ProductStatus::BoughtOut.id();

        let mut latest = state
            .contracts
            .values()
            .filter(|c| c.toode_id == id)
            .max_by_key(|c| c.leping_id)
            .cloned();
        if let Some(contract) = latest.as_mut() {
            self.contract_write_allowed()?;
            contract.mark_bought_out(today);
        }

        // nothing above touched `state`; publish both rows together
        state.products.insert(id, product.clone());
        if let Some(contract) = &latest {
            state.contracts.insert(contract.leping_id, contract.clone());
        }

        Ok(Buyout {
            toode: product,
            leping: latest,
        })
    }

    async fn list_employees(&self, page: Page) -> StoreResult<Paged<Employee>> {
        let state = self.lock();
        let rows = state.employees.values().cloned().collect();
        Ok(paginate(rows, page))
    }

    async fn search_employees(&self, term: &str) -> StoreResult<Vec<Employee>> {
        Ok(self
            .lock()
            .employees
            .values()
            .filter(|e| {
                contains(&e.nimi, term) || contains(&e.perekonnanimi, term) || e.kood.contains(term)
            })
            .cloned()
            .collect())
    }

    async fn get_employee(&self, id: u64) -> StoreResult<Option<Employee>> {
        Ok(self.lock().employees.get(&id).cloned())
    }

    async fn employee_by_kood(&self, kood: &str) -> StoreResult<Option<Employee>> {
        Ok(self
            .lock()
            .employees
            .values()
            .find(|e| e.kood == kood)
            .cloned())
    }

    async fn insert_employee(&self, employee: NewEmployee) -> StoreResult<Employee> {
        let mut state = self.lock();
        if state.employees.values().any(|e| e.kood == employee.kood) {
            return Err(StoreError::Duplicate);
        }

        let row = Employee {
            tootaja_id: state.next_id(),
            nimi: employee.nimi,
            perekonnanimi: employee.perekonnanimi,
            kood: employee.kood,
            tel: employee.tel,
            aadres: employee.aadres,
            role_id: employee.role_id,
            pass: employee.pass,
        };
        state.employees.insert(row.tootaja_id, row.clone());
        Ok(row)
    }

    async fn update_employee(&self, employee: &Employee) -> StoreResult<()> {
        let mut state = self.lock();
        if !state.employees.contains_key(&employee.tootaja_id) {
            return Err(StoreError::NotFound("Employee"));
        }
        if state
            .employees
            .values()
            .any(|e| e.kood == employee.kood && e.tootaja_id != employee.tootaja_id)
        {
            return Err(StoreError::Duplicate);
        }
        state.employees.insert(employee.tootaja_id, employee.clone());
        Ok(())
    }

    async fn delete_employee(&self, id: u64) -> StoreResult<Option<Employee>> {
        let mut state = self.lock();
        if state.contracts.values().any(|c| c.tootaja_id == id) {
            return Err(StoreError::InUse);
        }
        Ok(state.employees.remove(&id))
    }

    fn employee_koods(&self) -> BoxStream<'_, StoreResult<(String, u64)>> {
        let rows: Vec<_> = self
            .lock()
            .employees
            .values()
            .map(|e| Ok((e.kood.clone(), e.tootaja_id)))
            .collect();
        stream::iter(rows).boxed()
    }

    async fn list_contracts(&self, page: Page) -> StoreResult<Paged<ContractDetail>> {
        self.search_contracts(&ContractFilter::default(), page).await
    }

    async fn search_contracts(
        &self,
        filter: &ContractFilter,
        page: Page,
    ) -> StoreResult<Paged<ContractDetail>> {
        let state = self.lock();
        let kind = filter.leping_type.map(|t| t.to_string());

        let rows = state
            .contracts
            .values()
            .rev()
            .filter_map(|c| state.detail(c))
            .filter(|d| {
                filter.search.as_deref().is_none_or(|term| {
                    term.parse::<u64>().ok() == Some(d.leping.leping_id)
                        || contains(&d.klient.nimi, term)
                        || contains(&d.klient.perekonnanimi, term)
                        || d.klient.kood.contains(term)
                        || contains(&d.toode.nimetus, term)
                })
            })
            .filter(|d| kind.is_none() || d.leping.leping_type == kind)
            .filter(|d| {
                filter
                    .date_from
                    .is_none_or(|from| d.leping.date.is_some_and(|date| date >= from))
            })
            .filter(|d| {
                filter
                    .date_to
                    .is_none_or(|to| d.leping.date.is_some_and(|date| date <= to))
            })
            .collect();

        Ok(paginate(rows, page))
    }

    async fn get_contract(&self, id: u64) -> StoreResult<Option<Contract>> {
        Ok(self.lock().contracts.get(&id).cloned())
    }

    async fn contract_detail(&self, id: u64) -> StoreResult<Option<ContractDetail>> {
        let state = self.lock();
        Ok(state.contracts.get(&id).and_then(|c| state.detail(c)))
    }

    async fn create_contract(&self, contract: NewContract) -> StoreResult<Contract> {
        let mut state = self.lock();
        state.check_contract_refs(contract.klient_id, contract.toode_id, contract.tootaja_id)?;
        self.contract_write_allowed()?;

        let row = Contract {
            leping_id: state.next_id(),
            klient_id: contract.klient_id,
            toode_id: contract.toode_id,
            tootaja_id: contract.tootaja_id,
            date: Some(contract.date),
            date_valja_ostud: contract.date_valja_ostud,
            pant_hind: contract.pant_hind,
            valja_ostud_hind: contract.valja_ostud_hind,
            ostuhind: contract.ostuhind,
            muugihind: contract.muugihind,
            leping_type: Some(contract.leping_type.to_string()),
        };
        state.contracts.insert(row.leping_id, row.clone());
        Ok(row)
    }

    async fn update_contract(&self, id: u64, patch: &ContractPatch) -> StoreResult<Contract> {
        let mut state = self.lock();
        let mut contract = state
            .contracts
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("Contract"))?;

        let previous_client = contract.klient_id;
        contract.apply(patch);

        if contract.klient_id != previous_client {
            state.check_contract_refs(contract.klient_id, contract.toode_id, contract.tootaja_id)?;
        } else if !state.products.contains_key(&contract.toode_id)
            || !state.employees.contains_key(&contract.tootaja_id)
        {
            return Err(StoreError::InvalidReference);
        }
        self.contract_write_allowed()?;

        state.contracts.insert(id, contract.clone());
        Ok(contract)
    }

    async fn delete_contract(&self, id: u64) -> StoreResult<bool> {
        Ok(self.lock().contracts.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{client::ClientStatus, contract::ContractType};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 10).unwrap()
    }

    async fn seed_client(store: &MemoryStore, kood: &str, status: Option<&str>) -> Client {
        let mut client = store
            .insert_client(NewClient {
                nimi: "Mihhail".into(),
                perekonnanimi: "Mihhailov".into(),
                kood: kood.into(),
                tel: Some("58549805".into()),
                aadres: Some("Puskini 26-6, Narva".into()),
                status: ClientStatus::Active,
            })
            .await
            .unwrap();
        // legacy rows carry whatever casing was typed in
        client.status = status.map(str::to_string);
        store.update_client(&client).await.unwrap();
        client
    }

    async fn seed_product(store: &MemoryStore) -> Product {
        store
            .insert_product(NewProduct {
                nimetus: "telefon".into(),
                kirjeldus: Some("denver 24200m".into()),
                status_id: ProductStatus::Pawned.id(),
                image: None,
                hind: Decimal::new(1000, 2),
            })
            .await
            .unwrap()
    }

    async fn seed_employee(store: &MemoryStore) -> Employee {
        store
            .insert_employee(NewEmployee {
                nimi: "Jaan".into(),
                perekonnanimi: "Tamm".into(),
                kood: "38001085718".into(),
                tel: None,
                aadres: None,
                role_id: 2,
                pass: "hash".into(),
            })
            .await
            .unwrap()
    }

    fn pawn(client: &Client, product: &Product, employee: &Employee) -> NewContract {
        NewContract {
            klient_id: client.klient_id,
            toode_id: product.toode_id,
            tootaja_id: employee.tootaja_id,
            date: NaiveDate::from_ymd_opt(2024, 8, 30).unwrap(),
            date_valja_ostud: NaiveDate::from_ymd_opt(2024, 9, 16),
            pant_hind: Some(Decimal::new(1000, 2)),
            valja_ostud_hind: Some(Decimal::new(1400, 2)),
            ostuhind: None,
            muugihind: None,
            leping_type: ContractType::Pawn,
        }
    }

    async fn contract_count(store: &MemoryStore) -> u64 {
        store
            .list_contracts(Page { page: 1, limit: 100 })
            .await
            .unwrap()
            .total
    }

    #[actix_web::test]
    async fn blocked_client_gets_no_contract_in_any_casing() {
        let store = MemoryStore::new();
        let product = seed_product(&store).await;
        let employee = seed_employee(&store).await;

        for (i, status) in ["blocked", "BLOCKED", "Blocked"].into_iter().enumerate() {
            let kood = format!("4940313651{}", i);
            let client = seed_client(&store, &kood, Some(status)).await;
            let err = store
                .create_contract(pawn(&client, &product, &employee))
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::ClientBlocked), "{status}");
        }

        assert_eq!(contract_count(&store).await, 0);
    }

    #[actix_web::test]
    async fn mixed_case_active_client_gets_contract() {
        let store = MemoryStore::new();
        let client = seed_client(&store, "49403136515", Some("ACTIVE")).await;
        let product = seed_product(&store).await;
        let employee = seed_employee(&store).await;

        let contract = store
            .create_contract(pawn(&client, &product, &employee))
            .await
            .unwrap();
        assert_eq!(contract.leping_type.as_deref(), Some("pant"));
        assert_eq!(contract_count(&store).await, 1);
    }

    #[actix_web::test]
    async fn missing_client_is_reported() {
        let store = MemoryStore::new();
        let product = seed_product(&store).await;
        let employee = seed_employee(&store).await;
        let mut ghost = seed_client(&store, "49403136515", None).await;
        ghost.klient_id = 9_999;

        let err = store
            .create_contract(pawn(&ghost, &product, &employee))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ClientNotFound));
    }

    #[actix_web::test]
    async fn buyout_without_contract_only_moves_product() {
        let store = MemoryStore::new();
        let product = seed_product(&store).await;

        let outcome = store.buyout_product(product.toode_id, today()).await.unwrap();
        assert!(outcome.leping.is_none());
        assert!(outcome.toode.is_bought_out());

        let stored = store.get_product(product.toode_id).await.unwrap().unwrap();
        assert_eq!(stored.status_id, ProductStatus::BoughtOut.id());
        assert_eq!(contract_count(&store).await, 0);
    }

    #[actix_web::test]
    async fn buyout_redeems_only_the_latest_contract() {
        let store = MemoryStore::new();
        let client = seed_client(&store, "49403136515", Some("active")).await;
        let product = seed_product(&store).await;
        let employee = seed_employee(&store).await;

        let first = store
            .create_contract(pawn(&client, &product, &employee))
            .await
            .unwrap();
        let second = store
            .create_contract(pawn(&client, &product, &employee))
            .await
            .unwrap();

        let outcome = store.buyout_product(product.toode_id, today()).await.unwrap();
        let redeemed = outcome.leping.unwrap();
        assert_eq!(redeemed.leping_id, second.leping_id);
        assert_eq!(redeemed.leping_type.as_deref(), Some("väljaost"));
        assert_eq!(redeemed.date_valja_ostud, Some(today()));

        let untouched = store.get_contract(first.leping_id).await.unwrap().unwrap();
        assert_eq!(untouched, first);
    }

    #[actix_web::test]
    async fn buyout_of_missing_product_changes_nothing() {
        let store = MemoryStore::new();
        let product = seed_product(&store).await;

        let err = store.buyout_product(404_404, today()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Product")));

        let stored = store.get_product(product.toode_id).await.unwrap().unwrap();
        assert_eq!(stored, product);
    }

    #[actix_web::test]
    async fn failed_contract_write_rolls_back_product() {
        let store = MemoryStore::new();
        let client = seed_client(&store, "49403136515", None).await;
        let product = seed_product(&store).await;
        let employee = seed_employee(&store).await;
        let contract = store
            .create_contract(pawn(&client, &product, &employee))
            .await
            .unwrap();

        store.fail_contract_writes(true);
        let err = store.buyout_product(product.toode_id, today()).await.unwrap_err();
        assert!(matches!(err, StoreError::Injected(_)));

        let stored = store.get_product(product.toode_id).await.unwrap().unwrap();
        assert_eq!(stored.status_id, ProductStatus::Pawned.id());
        let stored = store.get_contract(contract.leping_id).await.unwrap().unwrap();
        assert_eq!(stored, contract);
    }

    #[actix_web::test]
    async fn concurrent_buyouts_apply_once() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_product(&store).await.toode_id;

        let attempts = (0..8).map(|_| {
            let store = store.clone();
            async move { store.buyout_product(id, today()).await }
        });
        let results = futures::future::join_all(attempts).await;

        let won = results.iter().filter(|r| r.is_ok()).count();
        let lost = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::AlreadyBoughtOut)))
            .count();
        assert_eq!(won, 1);
        assert_eq!(lost, 7);
    }

    #[actix_web::test]
    async fn moving_contract_to_blocked_client_is_refused() {
        let store = MemoryStore::new();
        let good = seed_client(&store, "49403136515", Some("ACTIVE")).await;
        let bad = seed_client(&store, "38001085718", Some("Blocked")).await;
        let product = seed_product(&store).await;
        let employee = seed_employee(&store).await;
        let contract = store
            .create_contract(pawn(&good, &product, &employee))
            .await
            .unwrap();

        let err = store
            .update_contract(
                contract.leping_id,
                &ContractPatch {
                    klient_id: Some(bad.klient_id),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ClientBlocked));

        let stored = store.get_contract(contract.leping_id).await.unwrap().unwrap();
        assert_eq!(stored.klient_id, good.klient_id);
    }

    #[actix_web::test]
    async fn referenced_rows_cannot_be_deleted() {
        let store = MemoryStore::new();
        let client = seed_client(&store, "49403136515", None).await;
        let product = seed_product(&store).await;
        let employee = seed_employee(&store).await;
        store
            .create_contract(pawn(&client, &product, &employee))
            .await
            .unwrap();

        assert!(matches!(store.delete_client(client.klient_id).await, Err(StoreError::InUse)));
        assert!(matches!(store.delete_product(product.toode_id).await, Err(StoreError::InUse)));
        assert!(matches!(
            store.delete_status(ProductStatus::Pawned.id()).await,
            Err(StoreError::InUse)
        ));
    }

    #[actix_web::test]
    async fn contract_search_matches_client_and_type() {
        let store = MemoryStore::new();
        let client = seed_client(&store, "49403136515", None).await;
        let product = seed_product(&store).await;
        let employee = seed_employee(&store).await;
        store
            .create_contract(pawn(&client, &product, &employee))
            .await
            .unwrap();
        let page = Page { page: 1, limit: 10 };

        let by_name = ContractFilter {
            search: Some("mihhailov".into()),
            ..Default::default()
        };
        assert_eq!(store.search_contracts(&by_name, page).await.unwrap().total, 1);

        let by_type = ContractFilter {
            leping_type: Some(ContractType::Sale),
            ..Default::default()
        };
        assert_eq!(store.search_contracts(&by_type, page).await.unwrap().total, 0);

        let listed = store.list_contracts(page).await.unwrap();
        assert_eq!(listed.data[0].klient.kood, "49403136515");
        assert_eq!(listed.data[0].tootaja.nimi, "Jaan");
    }
}
