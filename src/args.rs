use clap::{Parser, Subcommand};

/// This is the administration program for election reference data: bulk imports, import templates and exports.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, global = true, takes_value = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Imports one or more files into a store.
    Import(ImportArgs),
    /// Writes the template of an import file.
    Template(TemplateArgs),
    /// Exports candidates or results from a store.
    Export(ExportArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ImportArgs {
    /// (file path, optional) A JSON job file listing the store and the files to import.
    /// For more information about the file format, read the manual of the bulk_import crate.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path, optional) A single file to import (.csv or .xlsx). Requires --kind. Setting this option
    /// overrides the sources that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// The kind of data in the input file: division, district, constituency, party, candidate,
    /// polling_center, polling_result, voter_demographics or constituency_result.
    #[clap(short, long, value_parser)]
    pub kind: Option<String>,

    /// (file path) The JSON file holding the store. It is created if it does not exist. Setting this option
    /// overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub store: Option<String>,

    /// (number, default 1) The id of the operator recorded in the import history.
    #[clap(long, value_parser)]
    pub operator: Option<u64>,

    /// If passed as an argument, the files are only checked and a preview is returned. The store is not modified.
    #[clap(long, takes_value = false)]
    pub dry_run: bool,

    /// When using an Excel file, indicates the name of the worksheet to use. The first worksheet is used otherwise.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the import reports will be written in JSON format to the given
    /// location. They are written to the standard output otherwise.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing the expected reports in JSON format. If provided, elecadmin will
    /// check that the reports match the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct TemplateArgs {
    /// The kind of data for which the template is written.
    #[clap(short, long, value_parser)]
    pub kind: String,

    /// (file path, 'stdout' or empty) Where to write the template in CSV format.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ExportArgs {
    /// (file path) The JSON file holding the store.
    #[clap(short, long, value_parser)]
    pub store: String,

    /// What to export: candidates or results.
    #[clap(short, long, value_parser)]
    pub data_type: String,

    /// (csv or json, default csv) The format of the export.
    #[clap(short, long, value_parser, default_value = "csv")]
    pub format: String,

    /// Only exports the data of this election year.
    #[clap(long, value_parser)]
    pub election_year: Option<i32>,

    /// Only exports the data of this constituency (by id).
    #[clap(long, value_parser)]
    pub constituency_id: Option<u64>,

    /// (file path, 'stdout' or empty) Where to write the export. By default, a timestamped file
    /// is created in the current directory.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,
}
