// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands each subcommand to a
// use case in Layer 2. Results are printed here and nowhere else.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{BaselineArgs, Commands, EvaluateArgs, FinetuneArgs, PretrainArgs};

use birthplace_gpt::application::{
    evaluate_use_case::{london_baseline, EvalReport, EvaluateUseCase},
    train_use_case::TrainUseCase,
};

#[derive(Parser, Debug)]
#[command(
    name = "birthplace-gpt",
    version,
    about = "Pretrain, finetune and evaluate a character GPT that predicts birthplaces from names."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Pretrain(args)       => run_pretrain(args),
            Commands::Finetune(args)       => run_finetune(args),
            Commands::Evaluate(args)       => run_evaluate(args),
            Commands::LondonBaseline(args) => run_baseline(args),
        }
    }
}

fn run_pretrain(args: PretrainArgs) -> Result<()> {
    let use_case = TrainUseCase::new(args.model.into(), args.overrides.into_overrides(None));
    let report = use_case.pretrain(args.variant.into(), &args.pretrain_corpus, &args.writing_params)?;
    println!(
        "Pretraining complete: {} epochs, {} steps. Parameters written to {}",
        report.epochs,
        report.steps,
        args.writing_params.display()
    );
    Ok(())
}

fn run_finetune(args: FinetuneArgs) -> Result<()> {
    let use_case =
        TrainUseCase::new(args.model.into(), args.overrides.into_overrides(args.val_fraction));
    let report = use_case.finetune(
        args.variant.into(),
        &args.pretrain_corpus,
        &args.finetune_corpus,
        &args.writing_params,
        args.reading_params.as_deref(),
    )?;
    println!(
        "Finetuning complete: {} epochs, {} steps. Parameters written to {}",
        report.epochs,
        report.steps,
        args.writing_params.display()
    );
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let use_case = EvaluateUseCase::new(args.model.into());
    let report = use_case.evaluate(
        args.variant.into(),
        &args.pretrain_corpus,
        &args.reading_params,
        &args.eval_corpus,
        &args.outputs,
    )?;
    print_report(&report);
    println!("Predictions written to {}", args.outputs.display());
    Ok(())
}

fn run_baseline(args: BaselineArgs) -> Result<()> {
    print_report(&london_baseline(&args.eval_corpus)?);
    Ok(())
}

fn print_report(report: &EvalReport) {
    match (report.correct, report.accuracy()) {
        (Some(correct), Some(acc)) => {
            println!("Correct: {} out of {}: {:.2}%", correct, report.total, acc * 100.0)
        }
        _ => println!("No gold birthplaces provided; {} predictions made", report.total),
    }
}
