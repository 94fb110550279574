use anyhow::Result;
use clap::{Arg, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use kcat_cli::kcat::inference::inference;
use kcat_cli::kcat::inference::input::KcatInferenceConfig;
use kcat_cli::kcat::train::input::KcatTrainConfig;
use kcat_cli::kcat::train::trainer;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("KCAT_LOG", "error,kcat=info"))
        .init();

    let matches = Command::new("kcat")
        .version(clap::crate_version!())
        .about("\u{1F9EA} Kcat CLI - Enzyme turnover number prediction from compound graphs and protein sequences")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Train a new kcat prediction model from scratch")
                .arg(
                    Arg::new("config")
                        .help("Path to training configuration file")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("data_dir")
                        .short('d')
                        .long("data_dir")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Directory holding the extracted inputs. Overrides the data \
                             directory specified in the configuration file.",
                        )
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("output_dir")
                        .short('o')
                        .long("output_dir")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Directory that run arguments, metric logs and checkpoints are \
                             written to. Overrides the directory specified in the configuration file.",
                        )
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("epochs")
                        .short('e')
                        .long("epochs")
                        .value_parser(clap::value_parser!(usize))
                        .help("Number of training epochs. Overrides the configuration file."),
                )
                .arg(
                    Arg::new("device")
                        .long("device")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Device to run on: cpu, cuda, cuda:N or auto. Overrides the configuration file."),
                ),
        )
        .subcommand(
            Command::new("predict")
                .about("Predict kcat values for new data using a trained model")
                .arg(
                    Arg::new("config")
                        .help("Path to inference configuration file")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("model_path")
                        .short('m')
                        .long("model")
                        .help("Path to the trained model file (*.safetensors or *.pth)")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("data_dir")
                        .short('d')
                        .long("data_dir")
                        .help("Directory holding the extracted inputs")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output_file")
                        .help("Path to the output file for predictions (*.csv or *.tsv)")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("device")
                        .long("device")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Device to run on: cpu, cuda, cuda:N or auto"),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("predict", sub_m)) => handle_predict(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn print_template<T: serde::Serialize>(template: &T) -> Result<()> {
    eprintln!("[Kcat] No config file provided; printing a default configuration template.");
    println!("{}", serde_json::to_string_pretty(template)?);
    Ok(())
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let Some(config_path) = matches.get_one::<PathBuf>("config") else {
        return print_template(&KcatTrainConfig::default());
    };
    log::info!("[Kcat::Train] Training from config: {:?}", config_path);

    let result = KcatTrainConfig::from_arguments(config_path, matches)
        .and_then(|params| trainer::run_training(&params));
    match result {
        Ok(summary) => {
            log::info!(
                "[Kcat::Train] Test RMSE {:.4}, R2 {:.4}, MAE {:.4}; model saved to {:?}",
                summary.test.rmse,
                summary.test.r2,
                summary.test.mae,
                summary.model_path
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Training failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_predict(matches: &ArgMatches) -> Result<()> {
    let Some(config_path) = matches.get_one::<PathBuf>("config") else {
        return print_template(&KcatInferenceConfig::default());
    };
    log::info!("[Kcat::Predict] Inference using config: {:?}", config_path);

    let result = KcatInferenceConfig::from_arguments(config_path, matches)
        .and_then(|params| inference::run_inference(&params));
    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("Inference failed: {:#}", e);
            std::process::exit(1)
        }
    }
}
