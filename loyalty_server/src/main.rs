use dotenvy::dotenv;
use loyalty_server::{cli::handle_command_line_args, config::ServerConfig, server::run_server};

#[actix_web::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let args = handle_command_line_args();
    let config = ServerConfig::from_env_or_default(&args);

    match run_server(config).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}
