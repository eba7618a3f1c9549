//! Train and compare four classifier families on the partitioned
//! challenge dataset.
//!
//! Loads the signal and background Parquet partitions, prepares a
//! fixed-seed train/test split, then trains rectangular cuts, a boosted
//! decision tree, a Fisher discriminant and a multilayer perceptron
//! with the challenge's standard hyperparameters. Results land in the
//! output directory as `evaluation.json` and `roc.svg`.

use clap::Parser;
use higgsml::dataset::SplitOptions;
use higgsml::method::MethodKind;
use higgsml::pipeline::ClassificationPipeline;
use std::path::PathBuf;

/// Input variables of the challenge dataset, in declaration order.
const VARIABLES: [&str; 30] = [
    "DER_mass_MMC",
    "DER_mass_transverse_met_lep",
    "DER_mass_vis",
    "DER_pt_h",
    "DER_deltaeta_jet_jet",
    "DER_mass_jet_jet",
    "DER_prodeta_jet_jet",
    "DER_deltar_tau_lep",
    "DER_pt_tot",
    "DER_sum_pt",
    "DER_pt_ratio_lep_tau",
    "DER_met_phi_centrality",
    "DER_lep_eta_centrality",
    "PRI_tau_pt",
    "PRI_tau_eta",
    "PRI_tau_phi",
    "PRI_lep_pt",
    "PRI_lep_eta",
    "PRI_lep_phi",
    "PRI_met",
    "PRI_met_phi",
    "PRI_met_sumet",
    "PRI_jet_num",
    "PRI_jet_leading_pt",
    "PRI_jet_leading_eta",
    "PRI_jet_leading_phi",
    "PRI_jet_subleading_pt",
    "PRI_jet_subleading_eta",
    "PRI_jet_subleading_phi",
    "PRI_jet_all_pt",
];

const SPLIT_OPTIONS: &str = "NTrain_Signal=10000:NTrain_Background=20000:NTest_Signal=0:\
                             NTest_Background=0:SplitMode=Random:NormMode=NumEvents:!V";

/// The method lineup with its standard hyperparameters.
const METHODS: [(MethodKind, &str, &str); 4] = [
    (
        MethodKind::Cuts,
        "Cuts",
        "!H:!V:FitMethod=MC:EffSel:SampleSize=20000:VarProp=FSmart",
    ),
    (
        MethodKind::Bdt,
        "BDT",
        "!H:!V:NTrees=850:MinNodeSize=2.5%:MaxDepth=3:BoostType=AdaBoost:AdaBoostBeta=0.5:\
         UseBaggedBoost:BaggedSampleFraction=0.5:SeparationType=GiniIndex:nCuts=20",
    ),
    (
        MethodKind::Fisher,
        "Fisher",
        "H:!V:Fisher:VarTransform=None",
    ),
    (
        MethodKind::Mlp,
        "MLP",
        "!H:!V:NeuronType=tanh:VarTransform=N:NCycles=600:HiddenLayers=N+5:TestRate=5:\
         !UseRegulator",
    ),
];

#[derive(Parser, Debug)]
#[command(
    name = "train-classifiers",
    about = "Train cut, tree, linear and neural classifiers on the partitioned dataset"
)]
struct Cli {
    /// Signal partition written by prepare-dataset.
    #[arg(long, default_value = "data/higgs-signal.parquet")]
    signal: PathBuf,

    /// Collection name expected inside the signal partition.
    #[arg(long, default_value = "signal_events")]
    signal_collection: String,

    /// Background partition written by prepare-dataset.
    #[arg(long, default_value = "data/higgs-background.parquet")]
    background: PathBuf,

    /// Collection name expected inside the background partition.
    #[arg(long, default_value = "background_events")]
    background_collection: String,

    /// Train/test split options.
    #[arg(long, default_value = SPLIT_OPTIONS)]
    split_options: String,

    /// Directory for the evaluation report and the ROC canvas.
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut pipeline = ClassificationPipeline::new(cli.output_dir);
    for variable in VARIABLES {
        pipeline.add_variable(variable)?;
    }
    pipeline.load_signal(&cli.signal, &cli.signal_collection, 1.0)?;
    pipeline.load_background(&cli.background, &cli.background_collection, 1.0)?;
    pipeline.prepare_split(&SplitOptions::parse(&cli.split_options)?)?;

    for (kind, name, options) in METHODS {
        pipeline.book_method(kind, name, options)?;
    }
    pipeline.train_all()?;
    pipeline.test_all()?;
    pipeline.evaluate_all()?;
    let canvas = pipeline.render_roc()?;

    let report = pipeline
        .report()
        .ok_or_else(|| anyhow::anyhow!("evaluation produced no report"))?;
    for method in &report.methods {
        println!(
            "{:>8}: ROC integral {:.4}, separation {:.4}, trained in {:.2}s",
            method.name, method.roc_integral, method.separation, method.training_seconds
        );
    }
    println!("ROC canvas written to {}", canvas.display());
    Ok(())
}
