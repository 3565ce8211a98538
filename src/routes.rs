use crate::{
    api::{client, contract, employee, product, status, upload::ImageStore},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::ApiError,
};
use actix_files::Files;
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{
    ResponseError,
    dev::{ServiceRequest, fn_service},
    guard::{self, Guard},
    http::header,
    middleware::from_fn,
    web,
};
use std::sync::Arc;

pub type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP limiters, built once and shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    pub login: Limiter,
    pub protected: Limiter,
}

impl Limiters {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

fn build_limiter(requests_per_min: u32) -> anyhow::Result<Limiter> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow::anyhow!("invalid rate limit: {} per minute", requests_per_min))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

/// Matches `multipart/form-data` bodies, whatever the boundary.
fn multipart_form() -> impl Guard {
    guard::fn_guard(|ctx| {
        ctx.head()
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
    })
}

pub fn configure(
    cfg: &mut web::ServiceConfig,
    config: &Config,
    limiters: &Limiters,
    images: &ImageStore,
) {
    // Public routes
    cfg.service(
        web::scope(&config.api_prefix)
            .service(
                web::resource("/auth/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(web::resource("/toode/laos").route(web::get().to(product::products_in_stock)))
            // Protected routes
            .service(
                web::scope("")
                    .wrap(from_fn(auth_middleware)) // authentication
                    .wrap(limiters.protected.clone()) // rate limiting
                    .service(
                        web::resource("/auth/register").route(web::post().to(handlers::register)),
                    )
                    .service(
                        web::scope("/klient")
                            .service(
                                web::resource("")
                                    .route(web::get().to(client::list_clients))
                                    .route(web::post().to(client::create_client)),
                            )
                            .service(
                                web::resource("/search").route(web::get().to(client::search_clients)),
                            )
                            .service(
                                web::resource("/autocomplete")
                                    .route(web::get().to(client::autocomplete_clients)),
                            )
                            .service(
                                web::resource("/{id}")
                                    .route(web::get().to(client::get_client))
                                    .route(web::patch().to(client::update_client))
                                    .route(web::delete().to(client::delete_client)),
                            ),
                    )
                    .service(
                        web::scope("/toode")
                            .service(
                                web::resource("")
                                    .route(web::get().to(product::list_products))
                                    .route(
                                        web::post()
                                            .guard(multipart_form())
                                            .to(product::create_product_form),
                                    )
                                    .route(web::post().to(product::create_product)),
                            )
                            .service(
                                web::resource("/search")
                                    .route(web::get().to(product::search_products)),
                            )
                            .service(
                                web::resource("/autocomplete")
                                    .route(web::get().to(product::autocomplete_products)),
                            )
                            .service(
                                web::resource("/status/{status_id}")
                                    .route(web::get().to(product::products_by_status)),
                            )
                            .service(
                                web::resource("/{id}")
                                    .route(web::get().to(product::get_product))
                                    .route(
                                        web::put()
                                            .guard(multipart_form())
                                            .to(product::update_product_form),
                                    )
                                    .route(
                                        web::patch()
                                            .guard(multipart_form())
                                            .to(product::update_product_form),
                                    )
                                    .route(web::put().to(product::update_product))
                                    .route(web::patch().to(product::update_product))
                                    .route(web::delete().to(product::delete_product)),
                            )
                            .service(
                                web::resource("/{id}/buyout")
                                    .route(web::post().to(product::buyout_product)),
                            ),
                    )
                    .service(
                        web::scope("/status_toode")
                            .service(
                                web::resource("")
                                    .route(web::get().to(status::list_statuses))
                                    .route(web::post().to(status::create_status)),
                            )
                            .service(
                                web::resource("/{id}")
                                    .route(web::get().to(status::get_status))
                                    .route(web::put().to(status::update_status))
                                    .route(web::delete().to(status::delete_status)),
                            ),
                    )
                    .service(
                        web::scope("/tootaja")
                            .service(
                                web::resource("").route(web::get().to(employee::list_employees)),
                            )
                            .service(
                                web::resource("/search")
                                    .route(web::get().to(employee::search_employees)),
                            )
                            .service(
                                web::resource("/{id}")
                                    .route(web::get().to(employee::get_employee))
                                    .route(web::patch().to(employee::update_employee))
                                    .route(web::delete().to(employee::delete_employee)),
                            ),
                    )
                    .service(
                        web::scope("/leping")
                            .service(
                                web::resource("")
                                    .route(web::get().to(contract::list_contracts))
                                    .route(web::post().to(contract::create_contract)),
                            )
                            .service(
                                web::resource("/search")
                                    .route(web::get().to(contract::search_contracts)),
                            )
                            .service(
                                web::resource("/print/{id}")
                                    .route(web::get().to(contract::print_contract)),
                            )
                            .service(
                                web::resource("/{id}")
                                    .route(web::get().to(contract::get_contract))
                                    .route(web::put().to(contract::update_contract))
                                    .route(web::delete().to(contract::delete_contract)),
                            ),
                    ),
            ),
    );

    // Stored product images
    cfg.service(Files::new("/uploads", images.dir()).default_handler(fn_service(
        |req: ServiceRequest| async {
            let resp = ApiError::not_found("File not found.").error_response();
            Ok::<_, actix_web::Error>(req.into_response(resp))
        },
    )));
}
