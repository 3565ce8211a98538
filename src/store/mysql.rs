use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use rust_decimal::Decimal;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::debug;

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

const CLIENT_COLUMNS: &str = "klient_id, nimi, perekonnanimi, kood, tel, aadres, status";
const PRODUCT_COLUMNS: &str = "toode_id, nimetus, kirjeldus, status_id, image, hind";
const EMPLOYEE_COLUMNS: &str = "tootaja_id, nimi, perekonnanimi, kood, tel, aadres, role_id, pass";
const CONTRACT_COLUMNS: &str = "leping_id, klient_id, toode_id, tootaja_id, date, date_valja_ostud, \
     pant_hind, valja_ostud_hind, ostuhind, muugihind, leping_type";

const DETAIL_SELECT: &str = r#"
    SELECT
        l.leping_id, l.klient_id, l.toode_id, l.tootaja_id, l.date, l.date_valja_ostud,
        l.pant_hind, l.valja_ostud_hind, l.ostuhind, l.muugihind, l.leping_type,
        k.nimi AS klient_nimi, k.perekonnanimi AS klient_perekonnanimi, k.kood AS klient_kood,
        k.tel AS klient_tel, k.aadres AS klient_aadres,
        t.nimetus AS toode_nimetus, t.kirjeldus AS toode_kirjeldus, t.image AS toode_image,
        t.hind AS toode_hind,
        w.nimi AS tootaja_nimi, w.perekonnanimi AS tootaja_perekonnanimi
    FROM leping l
    JOIN klient k ON k.klient_id = l.klient_id
    JOIN toode t ON t.toode_id = l.toode_id
    JOIN tootaja w ON w.tootaja_id = l.tootaja_id
"#;

const DETAIL_JOINS: &str = r#"
    FROM leping l
    JOIN klient k ON k.klient_id = l.klient_id
    JOIN toode t ON t.toode_id = l.toode_id
    JOIN tootaja w ON w.tootaja_id = l.tootaja_id
"#;

const AUTOCOMPLETE_LIMIT: i64 = 10;

#[derive(sqlx::FromRow)]
struct ContractDetailRow {
    #[sqlx(flatten)]
    leping: Contract,
    klient_nimi: String,
    klient_perekonnanimi: String,
    klient_kood: String,
    klient_tel: Option<String>,
    klient_aadres: Option<String>,
    toode_nimetus: String,
    toode_kirjeldus: Option<String>,
    toode_image: Option<String>,
    toode_hind: Decimal,
    tootaja_nimi: String,
    tootaja_perekonnanimi: String,
}

impl From<ContractDetailRow> for ContractDetail {
    fn from(row: ContractDetailRow) -> Self {
        ContractDetail {
            leping: row.leping,
            klient: ClientSummary {
                nimi: row.klient_nimi,
                perekonnanimi: row.klient_perekonnanimi,
                kood: row.klient_kood,
                tel: row.klient_tel,
                aadres: row.klient_aadres,
            },
            toode: ProductSummary {
                nimetus: row.toode_nimetus,
                kirjeldus: row.toode_kirjeldus,
                image: row.toode_image,
                hind: row.toode_hind,
            },
            tootaja: EmployeeSummary {
                nimi: row.tootaja_nimi,
                perekonnanimi: row.tootaja_perekonnanimi,
            },
        }
    }
}

fn like(term: &str) -> String {
    format!("%{}%", term)
}

/// `PawnStore` over the shared MySQL schema.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn count(&self, table: &str) -> StoreResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(total as u64)
    }

    fn koods(&self, sql: &'static str) -> BoxStream<'_, StoreResult<(String, u64)>> {
        sqlx::query_as::<_, (String, u64)>(sql)
            .fetch(&self.pool)
            .map_err(StoreError::from)
            .boxed()
    }

    /// Appends the WHERE clause for a contract search to `qb`.
    fn push_contract_filter(qb: &mut QueryBuilder<'_, MySql>, filter: &ContractFilter) {
        qb.push(" WHERE 1=1");

        if let Some(term) = filter.search.as_deref() {
            let pattern = like(term);
            qb.push(" AND (");
            qb.push("l.leping_id = ").push_bind(term.parse::<u64>().unwrap_or(0));
            qb.push(" OR k.nimi LIKE ").push_bind(pattern.clone());
            qb.push(" OR k.perekonnanimi LIKE ").push_bind(pattern.clone());
            qb.push(" OR k.kood LIKE ").push_bind(pattern.clone());
            qb.push(" OR t.nimetus LIKE ").push_bind(pattern);
            qb.push(")");
        }

        if let Some(kind) = filter.leping_type {
            qb.push(" AND l.leping_type = ").push_bind(kind.to_string());
        }

        if let Some(from) = filter.date_from {
            qb.push(" AND l.date >= ").push_bind(from);
        }

        if let Some(to) = filter.date_to {
            qb.push(" AND l.date <= ").push_bind(to);
        }
    }

    async fn fetch_contract(&self, id: u64) -> StoreResult<Option<Contract>> {
        let sql = format!("SELECT {} FROM leping WHERE leping_id = ?", CONTRACT_COLUMNS);
        Ok(sqlx::query_as::<_, Contract>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }
}

/// Shared-locks the client row and applies the blocked gate.
async fn gate_client(tx: &mut sqlx::Transaction<'_, MySql>, klient_id: u64) -> StoreResult<()> {
    let sql = format!(
        "SELECT {} FROM klient WHERE klient_id = ? LOCK IN SHARE MODE",
        CLIENT_COLUMNS
    );
    let client = sqlx::query_as::<_, Client>(&sql)
        .bind(klient_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(StoreError::ClientNotFound)?;

    if client.is_blocked() {
        return Err(StoreError::ClientBlocked);
    }
    Ok(())
}

#[async_trait]
impl PawnStore for MySqlStore {
    async fn list_clients(&self, page: Page) -> StoreResult<Paged<Client>> {
        let total = self.count("klient").await?;
        let sql = format!(
            "SELECT {} FROM klient ORDER BY klient_id DESC LIMIT ? OFFSET ?",
            CLIENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, Client>(&sql)
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok(Paged::new(rows, total, page))
    }

    async fn search_clients(&self, term: &str) -> StoreResult<Vec<Client>> {
        let sql = format!(
            "SELECT {} FROM klient WHERE nimi LIKE ? OR perekonnanimi LIKE ? OR kood LIKE ?",
            CLIENT_COLUMNS
        );
        let pattern = like(term);
        Ok(sqlx::query_as::<_, Client>(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn autocomplete_clients(&self, term: &str) -> StoreResult<Vec<Client>> {
        let sql = format!(
            r#"
            SELECT {} FROM klient
            WHERE klient_id = ? OR nimi LIKE ? OR perekonnanimi LIKE ? OR kood LIKE ?
            ORDER BY klient_id
            LIMIT ?
            "#,
            CLIENT_COLUMNS
        );
        let pattern = like(term);
        Ok(sqlx::query_as::<_, Client>(&sql)
            .bind(term.parse::<u64>().unwrap_or(0))
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .bind(AUTOCOMPLETE_LIMIT)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_client(&self, id: u64) -> StoreResult<Option<Client>> {
        let sql = format!("SELECT {} FROM klient WHERE klient_id = ?", CLIENT_COLUMNS);
        Ok(sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn client_id_by_kood(&self, kood: &str) -> StoreResult<Option<u64>> {
        Ok(
            sqlx::query_scalar::<_, u64>("SELECT klient_id FROM klient WHERE kood = ?")
                .bind(kood)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_client(&self, client: NewClient) -> StoreResult<Client> {
        let status = client.status.to_string();
        let result = sqlx::query(
            r#"
            INSERT INTO klient (nimi, perekonnanimi, kood, tel, aadres, status)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&client.nimi)
        .bind(&client.perekonnanimi)
        .bind(&client.kood)
        .bind(&client.tel)
        .bind(&client.aadres)
        .bind(&status)
        .execute(&self.pool)
        .await?;

        Ok(Client {
            klient_id: result.last_insert_id(),
            nimi: client.nimi,
            perekonnanimi: client.perekonnanimi,
            kood: client.kood,
            tel: client.tel,
            aadres: client.aadres,
            status: Some(status),
        })
    }

    async fn update_client(&self, client: &Client) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE klient
            SET nimi = ?, perekonnanimi = ?, kood = ?, tel = ?, aadres = ?, status = ?
            WHERE klient_id = ?
            "#,
        )
        .bind(&client.nimi)
        .bind(&client.perekonnanimi)
        .bind(&client.kood)
        .bind(&client.tel)
        .bind(&client.aadres)
        .bind(&client.status)
        .bind(client.klient_id)
        .execute(&self.pool)
        .await?;

        // MySQL reports 0 affected rows for a no-op update, so check existence separately
        if result.rows_affected() == 0 && self.get_client(client.klient_id).await?.is_none() {
            return Err(StoreError::NotFound("Client"));
        }
        Ok(())
    }

    async fn delete_client(&self, id: u64) -> StoreResult<Option<Client>> {
        let Some(client) = self.get_client(id).await? else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM klient WHERE klient_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(Some(client))
    }

    fn client_koods(&self) -> BoxStream<'_, StoreResult<(String, u64)>> {
        self.koods("SELECT kood, klient_id FROM klient")
    }

    async fn list_statuses(&self) -> StoreResult<Vec<StatusRow>> {
        Ok(sqlx::query_as::<_, StatusRow>(
            "SELECT status_id, nimetus FROM status_toode ORDER BY status_id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_status(&self, id: u64) -> StoreResult<Option<StatusRow>> {
        Ok(sqlx::query_as::<_, StatusRow>(
            "SELECT status_id, nimetus FROM status_toode WHERE status_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_status(&self, nimetus: &str) -> StoreResult<StatusRow> {
        let result = sqlx::query("INSERT INTO status_toode (nimetus) VALUES (?)")
            .bind(nimetus)
            .execute(&self.pool)
            .await?;
        Ok(StatusRow {
            status_id: result.last_insert_id(),
            nimetus: nimetus.to_string(),
        })
    }

    async fn update_status(&self, status: &StatusRow) -> StoreResult<()> {
        sqlx::query("UPDATE status_toode SET nimetus = ? WHERE status_id = ?")
            .bind(&status.nimetus)
            .bind(status.status_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_status(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM status_toode WHERE status_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_products(&self, page: Page) -> StoreResult<Paged<Product>> {
        let total = self.count("toode").await?;
        let sql = format!(
            "SELECT {} FROM toode ORDER BY toode_id ASC LIMIT ? OFFSET ?",
            PRODUCT_COLUMNS
        );
        let rows = sqlx::query_as::<_, Product>(&sql)
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok(Paged::new(rows, total, page))
    }

    async fn search_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let mut qb = QueryBuilder::<MySql>::new(format!(
            "SELECT {} FROM toode WHERE 1=1",
            PRODUCT_COLUMNS
        ));

        if let Some(q) = filter.q.as_deref() {
            qb.push(" AND (nimetus LIKE ").push_bind(like(q));
            qb.push(" OR kirjeldus LIKE ").push_bind(like(q));
            qb.push(")");
        }
        if let Some(nimetus) = filter.nimetus.as_deref() {
            qb.push(" AND nimetus LIKE ").push_bind(like(nimetus));
        }
        if let Some(kirjeldus) = filter.kirjeldus.as_deref() {
            qb.push(" AND kirjeldus LIKE ").push_bind(like(kirjeldus));
        }
        if let Some(status_id) = filter.status_id {
            qb.push(" AND status_id = ").push_bind(status_id);
        }
        if let Some(min) = filter.min_price {
            qb.push(" AND hind >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            qb.push(" AND hind <= ").push_bind(max);
        }
        qb.push(" ORDER BY toode_id");

        debug!(sql = %qb.sql(), "Searching products");
        Ok(qb.build_query_as::<Product>().fetch_all(&self.pool).await?)
    }

    async fn autocomplete_products(&self, term: &str) -> StoreResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM toode WHERE toode_id = ? OR nimetus LIKE ? ORDER BY toode_id LIMIT ?",
            PRODUCT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(term.parse::<u64>().unwrap_or(0))
            .bind(like(term))
            .bind(AUTOCOMPLETE_LIMIT)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn products_by_status(&self, status_id: u64) -> StoreResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM toode WHERE status_id = ? ORDER BY toode_id",
            PRODUCT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(status_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn products_by_status_name(&self, nimetus: &str) -> StoreResult<Vec<Product>> {
        Ok(sqlx::query_as::<_, Product>(
            r#"
            SELECT t.toode_id, t.nimetus, t.kirjeldus, t.status_id, t.image, t.hind
            FROM toode t
            JOIN status_toode s ON s.status_id = t.status_id
            WHERE s.nimetus = ?
            ORDER BY t.toode_id
            "#,
        )
        .bind(nimetus)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_product(&self, id: u64) -> StoreResult<Option<Product>> {
        let sql = format!("SELECT {} FROM toode WHERE toode_id = ?", PRODUCT_COLUMNS);
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        let result = sqlx::query(
            r#"
            INSERT INTO toode (nimetus, kirjeldus, status_id, image, hind)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.nimetus)
        .bind(&product.kirjeldus)
        .bind(product.status_id)
        .bind(&product.image)
        .bind(product.hind)
        .execute(&self.pool)
        .await?;

        Ok(Product {
            toode_id: result.last_insert_id(),
            nimetus: product.nimetus,
            kirjeldus: product.kirjeldus,
            status_id: product.status_id,
            image: product.image,
            hind: product.hind,
        })
    }

    async fn update_product(&self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE toode
            SET nimetus = ?, kirjeldus = ?, status_id = ?, image = ?, hind = ?
            WHERE toode_id = ?
            "#,
        )
        .bind(&product.nimetus)
        .bind(&product.kirjeldus)
        .bind(product.status_id)
        .bind(&product.image)
        .bind(product.hind)
        .bind(product.toode_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_product(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM toode WHERE toode_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn buyout_product(&self, id: u64, today: NaiveDate) -> StoreResult<Buyout> {
        // dropping `tx` without commit rolls everything back
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {} FROM toode WHERE toode_id = ? FOR UPDATE",
            PRODUCT_COLUMNS
        );
        let mut product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound("Product"))?;

        if product.is_bought_out() {
            return Err(StoreError::AlreadyBoughtOut);
        }

        product.status_id = ProductStatus::BoughtOut.id();
        sqlx::query("UPDATE toode SET status_id = ? WHERE toode_id = ?")
            .bind(product.status_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            "SELECT {} FROM leping WHERE toode_id = ? ORDER BY leping_id DESC LIMIT 1 FOR UPDATE",
            CONTRACT_COLUMNS
        );
        let mut latest = sqlx::query_as::<_, Contract>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(contract) = latest.as_mut() {
            contract.mark_bought_out(today);
            sqlx::query(
                "UPDATE leping SET date_valja_ostud = ?, leping_type = ? WHERE leping_id = ?",
            )
            .bind(contract.date_valja_ostud)
            .bind(&contract.leping_type)
            .bind(contract.leping_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Buyout {
            toode: product,
            leping: latest,
        })
    }

    async fn list_employees(&self, page: Page) -> StoreResult<Paged<Employee>> {
        let total = self.count("tootaja").await?;
        let sql = format!(
            "SELECT {} FROM tootaja ORDER BY tootaja_id ASC LIMIT ? OFFSET ?",
            EMPLOYEE_COLUMNS
        );
        let rows = sqlx::query_as::<_, Employee>(&sql)
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok(Paged::new(rows, total, page))
    }

    async fn search_employees(&self, term: &str) -> StoreResult<Vec<Employee>> {
        let sql = format!(
            "SELECT {} FROM tootaja WHERE nimi LIKE ? OR perekonnanimi LIKE ? OR kood LIKE ?",
            EMPLOYEE_COLUMNS
        );
        let pattern = like(term);
        Ok(sqlx::query_as::<_, Employee>(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_employee(&self, id: u64) -> StoreResult<Option<Employee>> {
        let sql = format!("SELECT {} FROM tootaja WHERE tootaja_id = ?", EMPLOYEE_COLUMNS);
        Ok(sqlx::query_as::<_, Employee>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn employee_by_kood(&self, kood: &str) -> StoreResult<Option<Employee>> {
        let sql = format!("SELECT {} FROM tootaja WHERE kood = ?", EMPLOYEE_COLUMNS);
        Ok(sqlx::query_as::<_, Employee>(&sql)
            .bind(kood)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_employee(&self, employee: NewEmployee) -> StoreResult<Employee> {
        let result = sqlx::query(
            r#"
            INSERT INTO tootaja (nimi, perekonnanimi, kood, tel, aadres, role_id, pass)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&employee.nimi)
        .bind(&employee.perekonnanimi)
        .bind(&employee.kood)
        .bind(&employee.tel)
        .bind(&employee.aadres)
        .bind(employee.role_id)
        .bind(&employee.pass)
        .execute(&self.pool)
        .await?;

        Ok(Employee {
            tootaja_id: result.last_insert_id(),
            nimi: employee.nimi,
            perekonnanimi: employee.perekonnanimi,
            kood: employee.kood,
            tel: employee.tel,
            aadres: employee.aadres,
            role_id: employee.role_id,
            pass: employee.pass,
        })
    }

    async fn update_employee(&self, employee: &Employee) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE tootaja
            SET nimi = ?, perekonnanimi = ?, kood = ?, tel = ?, aadres = ?, role_id = ?, pass = ?
            WHERE tootaja_id = ?
            "#,
        )
        .bind(&employee.nimi)
        .bind(&employee.perekonnanimi)
        .bind(&employee.kood)
        .bind(&employee.tel)
        .bind(&employee.aadres)
        .bind(employee.role_id)
        .bind(&employee.pass)
        .bind(employee.tootaja_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_employee(&self, id: u64) -> StoreResult<Option<Employee>> {
        let Some(employee) = self.get_employee(id).await? else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM tootaja WHERE tootaja_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(Some(employee))
    }

    fn employee_koods(&self) -> BoxStream<'_, StoreResult<(String, u64)>> {
        self.koods("SELECT kood, tootaja_id FROM tootaja")
    }

    async fn list_contracts(&self, page: Page) -> StoreResult<Paged<ContractDetail>> {
        self.search_contracts(&ContractFilter::default(), page).await
    }

    async fn search_contracts(
        &self,
        filter: &ContractFilter,
        page: Page,
    ) -> StoreResult<Paged<ContractDetail>> {
        let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*)");
        count.push(DETAIL_JOINS);
        Self::push_contract_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut data = QueryBuilder::<MySql>::new(DETAIL_SELECT);
        Self::push_contract_filter(&mut data, filter);
        data.push(" ORDER BY l.leping_id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        debug!(sql = %data.sql(), "Fetching contracts");
        let rows = data
            .build_query_as::<ContractDetailRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Paged::new(
            rows.into_iter().map(ContractDetail::from).collect(),
            total as u64,
            page,
        ))
    }

    async fn get_contract(&self, id: u64) -> StoreResult<Option<Contract>> {
        self.fetch_contract(id).await
    }

    async fn contract_detail(&self, id: u64) -> StoreResult<Option<ContractDetail>> {
        let sql = format!("{} WHERE l.leping_id = ?", DETAIL_SELECT);
        let row = sqlx::query_as::<_, ContractDetailRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ContractDetail::from))
    }

    async fn create_contract(&self, contract: NewContract) -> StoreResult<Contract> {
        let mut tx = self.pool.begin().await?;
        gate_client(&mut tx, contract.klient_id).await?;

        let leping_type = contract.leping_type.to_string();
        let result = sqlx::query(
            r#"
            INSERT INTO leping
                (klient_id, toode_id, tootaja_id, date, date_valja_ostud,
                 pant_hind, valja_ostud_hind, ostuhind, muugihind, leping_type)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(contract.klient_id)
        .bind(contract.toode_id)
        .bind(contract.tootaja_id)
        .bind(contract.date)
        .bind(contract.date_valja_ostud)
        .bind(contract.pant_hind)
        .bind(contract.valja_ostud_hind)
        .bind(contract.ostuhind)
        .bind(contract.muugihind)
        .bind(&leping_type)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Contract {
            leping_id: result.last_insert_id(),
            klient_id: contract.klient_id,
            toode_id: contract.toode_id,
            tootaja_id: contract.tootaja_id,
            date: Some(contract.date),
            date_valja_ostud: contract.date_valja_ostud,
            pant_hind: contract.pant_hind,
            valja_ostud_hind: contract.valja_ostud_hind,
            ostuhind: contract.ostuhind,
            muugihind: contract.muugihind,
            leping_type: Some(leping_type),
        })
    }

    async fn update_contract(&self, id: u64, patch: &ContractPatch) -> StoreResult<Contract> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {} FROM leping WHERE leping_id = ? FOR UPDATE",
            CONTRACT_COLUMNS
        );
        let mut contract = sqlx::query_as::<_, Contract>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound("Contract"))?;

        let previous_client = contract.klient_id;
        contract.apply(patch);
        if contract.klient_id != previous_client {
            gate_client(&mut tx, contract.klient_id).await?;
        }

        sqlx::query(
            r#"
            UPDATE leping
            SET klient_id = ?, toode_id = ?, tootaja_id = ?, date = ?, date_valja_ostud = ?,
                pant_hind = ?, valja_ostud_hind = ?, ostuhind = ?, muugihind = ?, leping_type = ?
            WHERE leping_id = ?
            "#,
        )
        .bind(contract.klient_id)
        .bind(contract.toode_id)
        .bind(contract.tootaja_id)
        .bind(contract.date)
        .bind(contract.date_valja_ostud)
        .bind(contract.pant_hind)
        .bind(contract.valja_ostud_hind)
        .bind(contract.ostuhind)
        .bind(contract.muugihind)
        .bind(&contract.leping_type)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(contract)
    }

    async fn delete_contract(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM leping WHERE leping_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
