use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct LoginReqDto {
    pub kood: Option<String>,
    pub pass: Option<String>,
}

/// Body of `POST /auth/register`.
#[derive(Deserialize)]
pub struct RegisterReq {
    pub nimi: Option<String>,
    pub perekonnanimi: Option<String>,
    pub kood: Option<String>,
    pub tel: Option<String>,
    pub aadres: Option<String>,
    pub role_id: Option<u8>,
    pub pass: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub role: u8, // role id
    pub exp: usize,
    pub jti: String,
}
