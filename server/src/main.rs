use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};

use server::config::ServerConfig;
use server::directory::{Authenticator, InMemoryDirectory, RoomDirectory};
use server::handlers;
use server::registry::SessionRegistry;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let config = ServerConfig::from_env()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

    let directory = Arc::new(match &config.rooms_file {
        Some(path) => InMemoryDirectory::from_file(path)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?,
        None => {
            let directory = InMemoryDirectory::new();
            let code = directory.create_demo_room();
            log::info!("no rooms file configured; created public demo room {}", code);
            directory
        }
    });

    let registry = SessionRegistry::new(
        directory.clone() as Arc<dyn RoomDirectory>,
        config.session.clone(),
    );
    {
        let registry = registry.clone();
        directory.set_roles_changed_hook(move |room_id| registry.notify_roles_changed(room_id));
    }
    let auth: Arc<dyn Authenticator> = directory;

    log::info!("listening on {}", config.bind_addr);
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::new(registry.clone()))
            .app_data(web::Data::from(auth.clone()))
            .configure(handlers::root)
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
