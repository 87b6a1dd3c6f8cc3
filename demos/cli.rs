use std::env;

use wekeo_hda::{Client, ClientOptions, Credentials, QueryDescriptor};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wekeo_hda=info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() == 1 {
        eprintln!(
            "Usage:\n  cargo run --example cli -- retrieve <descriptor.json> [download_dir]\n  cargo run --example cli -- metadata <dataset_id>\n\nCredentials come from HDA_USER / HDA_PASSWORD.\n\nNotes:\n- This will contact the WEkEO HDA broker.\n- Most datasets require a one-time licence acceptance on your account."
        );
        return;
    }

    let Some(creds) = Credentials::from_env() else {
        eprintln!("Set HDA_USER and HDA_PASSWORD first.");
        std::process::exit(2);
    };

    match args.get(1).map(|s| s.as_str()) {
        Some("retrieve") => {
            let Some(descriptor_path) = args.get(2) else {
                eprintln!("retrieve needs a descriptor file");
                std::process::exit(2);
            };
            let download_dir = args.get(3).cloned().unwrap_or_else(|| ".".to_string());

            let descriptor = match QueryDescriptor::from_file(descriptor_path) {
                Ok(d) => d,
                Err(e) => {
                    eprintln!("cannot load {descriptor_path}: {e}");
                    std::process::exit(1);
                }
            };

            let opts = ClientOptions {
                download_dir: download_dir.into(),
                ..ClientOptions::default()
            };
            let mut client = Client::new(opts, creds).expect("create client");

            match client.retrieve(&descriptor) {
                Ok(reports) => {
                    for r in &reports {
                        println!(
                            "{path}: {bytes} bytes in {secs:.1}s",
                            path = r.path.display(),
                            bytes = r.bytes,
                            secs = r.elapsed.as_secs_f64()
                        );
                    }
                    println!("{} file(s) downloaded", reports.len());
                }
                Err(e) => {
                    eprintln!("retrieve failed: {e}");
                    eprintln!("Tip: check the dataset's licence is accepted on your WEkEO account, and that the descriptor's datasetId matches the catalogue.");
                    std::process::exit(1);
                }
            }
        }

        Some("metadata") => {
            let Some(dataset_id) = args.get(2) else {
                eprintln!("metadata needs a dataset id");
                std::process::exit(2);
            };

            let client = Client::connect(ClientOptions::default(), creds).expect("create client");
            match client.query_metadata(dataset_id) {
                Ok(v) => println!("{}", serde_json::to_string_pretty(&v).expect("render json")),
                Err(e) => {
                    eprintln!("metadata failed: {e}");
                    std::process::exit(1);
                }
            }
        }

        _ => {
            eprintln!("Unknown command. Use: retrieve|metadata");
            std::process::exit(2);
        }
    }
}
