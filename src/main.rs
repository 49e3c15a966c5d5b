use std::{
    fs::File,
    io::{self, BufRead, BufWriter, Write},
    path::PathBuf,
    time::Instant,
};

use clap::{Args, Parser, Subcommand};

use wordseg::{
    maxent::trainer, CrossValidator, Dataset, Dictionary, ErrorPrinter, Evaluator, GeneratorKind,
    MaxentModel, Result, Segmenter, TrainingParams, WordSegmenter,
};

#[derive(Parser, Debug)]
#[clap(name = "wordseg", about = "Maximum entropy Chinese word segmentation")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ParamArgs {
    /// JSON file with training parameters.
    #[clap(long)]
    params: Option<PathBuf>,

    /// Parameter assignment, e.g. `-p cutoff=5` or `-p feature.t_2=false`.
    #[clap(short = 'p', long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,

    /// Context generator; must match between training and use.
    #[clap(long, value_enum)]
    generator: Option<GeneratorKind>,
}

impl ParamArgs {
    fn overrides_generator(&self) -> bool {
        self.generator.is_some() || self.params.is_some() || !self.set.is_empty()
    }

    /// Decodes with the generator recorded in the model unless one is given
    /// on the command line.
    fn segmenter<'a>(&self, model: &'a MaxentModel) -> Result<Segmenter<'a>> {
        if self.overrides_generator() {
            Ok(Segmenter::new(model, self.load()?.context_generator()))
        } else {
            Ok(Segmenter::from_model(model))
        }
    }

    fn load(&self) -> Result<TrainingParams> {
        let mut params = match &self.params {
            Some(path) => TrainingParams::from_path(path)?,
            None => TrainingParams::default(),
        };
        for pair in &self.set {
            params.set_pair(pair)?;
        }
        if let Some(generator) = self.generator {
            params.generator = generator;
        }
        Ok(params)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Trains a model from a segmented corpus.
    Train {
        /// One sentence per line, words separated by whitespace.
        #[clap(short = 'c', long)]
        corpus: PathBuf,
        #[clap(short = 'm', long)]
        model: PathBuf,
        #[clap(flatten)]
        params: ParamArgs,
    },
    /// Segments raw sentences read from stdin, one per line.
    Segment {
        #[clap(short = 'm', long)]
        model: PathBuf,
        #[clap(flatten)]
        params: ParamArgs,
        /// Overrides the beam size stored in the model.
        #[clap(long)]
        beam_size: Option<usize>,
    },
    /// Evaluates a model against a gold corpus.
    Eval {
        #[clap(short = 'm', long)]
        model: PathBuf,
        #[clap(short = 'g', long)]
        gold: PathBuf,
        /// Segmented corpus whose words count as in-vocabulary.
        #[clap(short = 'd', long)]
        dictionary: Option<PathBuf>,
        /// Writes misclassified sentences here.
        #[clap(short = 'e', long)]
        errors: Option<PathBuf>,
        #[clap(flatten)]
        params: ParamArgs,
    },
    /// n-fold cross validation on a segmented corpus.
    CrossValidate {
        #[clap(short = 'c', long)]
        corpus: PathBuf,
        #[clap(short = 'n', long, default_value_t = 10)]
        folds: usize,
        #[clap(short = 'd', long)]
        dictionary: Option<PathBuf>,
        #[clap(flatten)]
        params: ParamArgs,
    },
    /// Prints a model as JSON.
    Dump {
        #[clap(short = 'm', long)]
        model: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Train { corpus, model, params } => {
            let params = params.load()?;
            let begin = Instant::now();
            let dataset = Dataset::try_from(File::open(&corpus)?)?;
            log::info!(
                "read {} sentences ({} characters, longest {}) in {:?}",
                dataset.len(),
                dataset.total_chars(),
                dataset.max_length(),
                begin.elapsed()
            );
            let generator = params.context_generator();
            let trained = trainer::train(dataset.samples(), &params, generator.as_ref())?;
            trained.save(&model)?;
            log::info!("model saved to {} after {:?}", model.display(), begin.elapsed());
        }
        Command::Segment { model, params, beam_size } => {
            let model = MaxentModel::from_path(model)?;
            let mut segmenter = params.segmenter(&model)?;
            if let Some(size) = beam_size {
                segmenter = segmenter.with_beam_size(size);
            }
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            for line in io::stdin().lock().lines() {
                let words = segmenter.segment(&line?)?;
                writeln!(out, "{}", words.join(" "))?;
            }
            out.flush()?;
        }
        Command::Eval { model, gold, dictionary, errors, params } => {
            let model = MaxentModel::from_path(model)?;
            let segmenter = params.segmenter(&model)?;
            let dataset = Dataset::try_from(File::open(gold)?)?;
            let dictionary = dictionary.map(Dictionary::from_path).transpose()?;
            let mut printer = errors.map(|p| File::create(p).map(|f| ErrorPrinter::new(BufWriter::new(f)))).transpose()?;

            let mut evaluator = Evaluator::new(&segmenter);
            if let Some(dictionary) = &dictionary {
                evaluator = evaluator.with_dictionary(dictionary);
            }
            if let Some(printer) = printer.as_mut() {
                evaluator = evaluator.with_listener(printer);
            }
            let measure = *evaluator.evaluate(dataset.samples())?;
            drop(evaluator);
            if let Some(printer) = printer {
                printer.into_inner().flush()?;
            }
            println!("{measure}");
        }
        Command::CrossValidate { corpus, folds, dictionary, params } => {
            let params = params.load()?;
            let dataset = Dataset::try_from(File::open(corpus)?)?;
            let mut validator = CrossValidator::new(params, folds)?;
            if let Some(path) = dictionary {
                validator = validator.with_dictionary(Dictionary::from_path(path)?);
            }
            let measure = validator.evaluate(dataset.samples())?;
            println!("{measure}");
        }
        Command::Dump { model } => {
            let model = MaxentModel::from_path(model)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            model.dump(&mut out)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
