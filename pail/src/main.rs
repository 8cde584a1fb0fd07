use clap::{arg, command, crate_name, Command};

mod cli;

#[tokio::main]
async fn main() {
    let cli = command!(crate_name!())
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .subcommand(Command::new(cli::VERSION_SUBCOMMAND).about(cli::VERSION_DESCRIPTION))
        .subcommand(Command::new(cli::BUGREPORT_SUBCOMMAND).about(cli::BUGREPORT_DESCRIPTION))
        .subcommand(Command::new(cli::SERVER_SUBCOMMAND).about(cli::SERVER_DESCRIPTION))
        .subcommand(
            Command::new(cli::UPLOAD_SUBCOMMAND)
                .about(cli::UPLOAD_DESCRIPTION)
                .arg(arg!(-u --uri <URI>).required(true).help("Pail server URI"))
                .arg(arg!(<FILES> ...).help("Paths of files to upload")),
        )
        .subcommand(
            Command::new(cli::LIST_SUBCOMMAND)
                .about(cli::LIST_DESCRIPTION)
                .arg(arg!(-u --uri <URI>).required(true).help("Pail server URI"))
                .arg(
                    arg!(-l --limit <LIMIT>)
                        .required(false)
                        .help("Maximum number of files to list"),
                ),
        )
        .subcommand(
            Command::new(cli::DELETE_SUBCOMMAND)
                .about(cli::DELETE_DESCRIPTION)
                .arg(arg!(-u --uri <URI>).required(true).help("Pail server URI"))
                .arg(
                    arg!(-k --key <KEY>)
                        .required(true)
                        .help("Storage key to delete"),
                ),
        )
        .subcommand(
            Command::new(cli::URL_SUBCOMMAND)
                .about(cli::URL_DESCRIPTION)
                .arg(arg!(-u --uri <URI>).required(true).help("Pail server URI"))
                .arg(
                    arg!(-k --key <KEY>)
                        .required(true)
                        .help("Storage key to refresh the download link for"),
                ),
        )
        .arg_required_else_help(true)
        .disable_version_flag(true)
        .get_matches();

    if cli.subcommand_matches(cli::VERSION_SUBCOMMAND).is_some() {
        cli::version::run();
    } else if cli.subcommand_matches(cli::BUGREPORT_SUBCOMMAND).is_some() {
        cli::bugreport::run();
    } else if cli.subcommand_matches(cli::SERVER_SUBCOMMAND).is_some() {
        cli::server::run().await;
    } else if let Some(upload_matches) = cli.subcommand_matches(cli::UPLOAD_SUBCOMMAND) {
        let uri = upload_matches.get_one::<String>("uri").unwrap();
        let files: Vec<String> = upload_matches
            .get_many::<String>("FILES")
            .unwrap()
            .cloned()
            .collect();
        cli::client::upload_files(uri, &files).await;
    } else if let Some(list_matches) = cli.subcommand_matches(cli::LIST_SUBCOMMAND) {
        let uri = list_matches.get_one::<String>("uri").unwrap();
        let limit = list_matches
            .get_one::<String>("limit")
            .and_then(|l| l.parse().ok());
        cli::client::list_files(uri, limit).await;
    } else if let Some(delete_matches) = cli.subcommand_matches(cli::DELETE_SUBCOMMAND) {
        let uri = delete_matches.get_one::<String>("uri").unwrap();
        let key = delete_matches.get_one::<String>("key").unwrap();
        cli::client::delete_file(uri, key).await;
    } else if let Some(url_matches) = cli.subcommand_matches(cli::URL_SUBCOMMAND) {
        let uri = url_matches.get_one::<String>("uri").unwrap();
        let key = url_matches.get_one::<String>("key").unwrap();
        cli::client::download_url(uri, key).await;
    }
}
