use clap::{Parser, Subcommand};

/// Labels free-text survey answers with emotions and follows the overall satisfaction.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// (file path, optional) A JSON configuration file. The flags below override its values.
    /// For more information about the file format, read the manual of the emotion_survey crate.
    #[clap(short, long, value_parser, global = true)]
    pub config: Option<String>,

    /// (directory, default resultados) Where the labelled workbook, the dominant emotion and
    /// the history are kept. Created if missing.
    #[clap(long, value_parser, global = true)]
    pub results_dir: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Labels every answer of a survey workbook and writes the labelled workbook with charts.
    Analyze {
        /// (file path) The survey in Excel format. The first row holds the questions.
        #[clap(short, long, value_parser)]
        input: String,

        /// (default: first worksheet) The name of the worksheet to read.
        #[clap(long, value_parser)]
        worksheet: Option<String>,

        /// (file path, optional) A copy of the labelled workbook. The workbook is always
        /// written to emociones_resultado.xlsx in the results directory as well.
        #[clap(short, long, value_parser)]
        out: Option<String>,

        /// (1 to 10, default 10) Number of answers sent to the classifier in one call.
        #[clap(long, value_parser)]
        batch_size: Option<usize>,

        /// Accept replies that contain a label instead of requiring an exact label.
        #[clap(long, takes_value = false)]
        lenient: bool,

        /// (file path) A reference summary in JSON format. If provided, emosurvey will
        /// check that the computed summary matches the reference.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Reports the dominant emotion and the satisfaction of the last analysis, with the history.
    Emotion {
        /// Report the current state only, without recording it in the history.
        #[clap(long, takes_value = false)]
        snapshot: bool,
    },
}
