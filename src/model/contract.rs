use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contract {
    pub leping_id: u64,
    pub klient_id: u64,
    pub toode_id: u64,
    pub tootaja_id: u64,
    pub date: Option<NaiveDate>,
    pub date_valja_ostud: Option<NaiveDate>,
    pub pant_hind: Option<Decimal>,
    pub valja_ostud_hind: Option<Decimal>,
    pub ostuhind: Option<Decimal>,
    pub muugihind: Option<Decimal>,
    pub leping_type: Option<String>,
}

impl Contract {
    /// Marks the contract as redeemed on `on`.
    pub fn mark_bought_out(&mut self, on: NaiveDate) {
        self.date_valja_ostud = Some(on);
        self.leping_type = Some(ContractType::Buyout.to_string());
    }

    /// Applies the fields present in `patch`.
    pub fn apply(&mut self, patch: &ContractPatch) {
        if let Some(klient_id) = patch.klient_id {
            self.klient_id = klient_id;
        }
        if let Some(toode_id) = patch.toode_id {
            self.toode_id = toode_id;
        }
        if let Some(tootaja_id) = patch.tootaja_id {
            self.tootaja_id = tootaja_id;
        }
        if let Some(date) = patch.date {
            self.date = Some(date);
        }
        if let Some(date) = patch.date_valja_ostud {
            self.date_valja_ostud = Some(date);
        }
        if let Some(v) = patch.pant_hind {
            self.pant_hind = Some(v);
        }
        if let Some(v) = patch.valja_ostud_hind {
            self.valja_ostud_hind = Some(v);
        }
        if let Some(v) = patch.ostuhind {
            self.ostuhind = Some(v);
        }
        if let Some(v) = patch.muugihind {
            self.muugihind = Some(v);
        }
        if let Some(kind) = patch.leping_type {
            self.leping_type = Some(kind.to_string());
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum ContractType {
    #[strum(to_string = "pant")]
    #[serde(rename = "pant")]
    Pawn,
    #[strum(to_string = "ost")]
    #[serde(rename = "ost")]
    Purchase,
    #[strum(to_string = "müük", serialize = "muuk")]
    #[serde(rename = "müük", alias = "muuk")]
    Sale,
    #[strum(to_string = "väljaost", serialize = "valjaost")]
    #[serde(rename = "väljaost", alias = "valjaost")]
    Buyout,
}

#[derive(Debug, Clone)]
pub struct NewContract {
    pub klient_id: u64,
    pub toode_id: u64,
    pub tootaja_id: u64,
    pub date: NaiveDate,
    pub date_valja_ostud: Option<NaiveDate>,
    pub pant_hind: Option<Decimal>,
    pub valja_ostud_hind: Option<Decimal>,
    pub ostuhind: Option<Decimal>,
    pub muugihind: Option<Decimal>,
    pub leping_type: ContractType,
}

/// Partial update; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct ContractPatch {
    pub klient_id: Option<u64>,
    pub toode_id: Option<u64>,
    pub tootaja_id: Option<u64>,
    pub date: Option<NaiveDate>,
    pub date_valja_ostud: Option<NaiveDate>,
    pub pant_hind: Option<Decimal>,
    pub valja_ostud_hind: Option<Decimal>,
    pub ostuhind: Option<Decimal>,
    pub muugihind: Option<Decimal>,
    pub leping_type: Option<ContractType>,
}

#[derive(Debug, Clone, Default)]
pub struct ContractFilter {
    /// Contract id, or a fragment of the client's name/kood or the product name.
    pub search: Option<String>,
    pub leping_type: Option<ContractType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientSummary {
    pub nimi: String,
    pub perekonnanimi: String,
    pub kood: String,
    pub tel: Option<String>,
    pub aadres: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    pub nimetus: String,
    pub kirjeldus: Option<String>,
    pub image: Option<String>,
    pub hind: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeSummary {
    pub nimi: String,
    pub perekonnanimi: String,
}

/// Contract joined with the parties it links, as listed and printed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractDetail {
    #[serde(flatten)]
    pub leping: Contract,
    pub klient: ClientSummary,
    pub toode: ProductSummary,
    pub tootaja: EmployeeSummary,
}
