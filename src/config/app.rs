use actix_web::web;

use crate::api::{certificate_controller, health_controller, nfe_controller};

pub fn config_services(cfg: &mut web::ServiceConfig) {
    log::info!("Configuring routes...");
    cfg.service(
        web::scope("/api")
            .service(web::resource("/health").route(web::get().to(health_controller::health)))
            .service(
                web::scope("/nfes")
                    .service(
                        web::resource("")
                            .route(web::post().to(nfe_controller::create_draft))
                            .route(web::get().to(nfe_controller::list_documents)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(nfe_controller::get_document)))
                    .service(web::resource("/{id}/items").route(web::put().to(nfe_controller::replace_items)))
                    .service(web::resource("/{id}/authorize").route(web::post().to(nfe_controller::authorize)))
                    .service(web::resource("/{id}/cancel").route(web::post().to(nfe_controller::cancel)))
                    .service(web::resource("/{id}/xml").route(web::get().to(nfe_controller::download_xml))),
            )
            .service(
                web::scope("/companies/{id}")
                    .service(web::resource("/sefaz-status").route(web::get().to(nfe_controller::sefaz_status)))
                    .service(
                        web::resource("/certificates")
                            .route(web::post().to(certificate_controller::upload))
                            .route(web::get().to(certificate_controller::list)),
                    ),
            )
            .service(web::resource("/certificates/{id}").route(web::delete().to(certificate_controller::delete))),
    );
}
