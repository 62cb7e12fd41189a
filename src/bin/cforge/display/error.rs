use std::io::{self, Write};

use anyhow::Error;
use crystal_forge::{DataError, ExploreError, FetchError, IoError, ModelError};

use crate::util::text::wrap;

#[rustfmt::skip]
pub fn print_error(err: &Error) {
    let mut stderr = io::stderr().lock();

    let _ = writeln!(stderr);
    let _ = writeln!(stderr, "   ╔══════════════════════════════════════════════════════════════╗");
    let _ = writeln!(stderr, "   ║  ✗ Error                                                     ║");
    let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");

    let msg = err.to_string();
    for line in wrap(&msg, 59) {
        let _ = writeln!(stderr, "   ║  {:<59} ║", line);
    }

    let mut source = err.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Caused by:                                                  ║");
        for line in wrap(&cause.to_string(), 57) {
            let _ = writeln!(stderr, "   ║    {:<57} ║", line);
        }
        source = cause.source();
    }

    if let Some(hints) = HintCollector::collect(err) {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Hints:                                                      ║");
        for hint in hints {
            let wrapped = wrap(&hint, 55);
            if let Some((first, rest)) = wrapped.split_first() {
                let _ = writeln!(stderr, "   ║    • {:<55} ║", first);
                for line in rest {
                    let _ = writeln!(stderr, "   ║      {:<55} ║", line);
                }
            }
        }
    }

    let _ = writeln!(stderr, "   ╚══════════════════════════════════════════════════════════════╝");
    let _ = writeln!(stderr);
}

/// First error of type `T` anywhere in the cause chain.
fn find<T: std::error::Error + 'static>(err: &Error) -> Option<&T> {
    err.chain().find_map(|e| e.downcast_ref::<T>())
}

struct HintCollector {
    hints: Vec<String>,
    has_typed_hints: bool,
}

impl HintCollector {
    fn new() -> Self {
        Self {
            hints: Vec::new(),
            has_typed_hints: false,
        }
    }

    fn collect(err: &Error) -> Option<Vec<String>> {
        let mut collector = Self::new();

        if let Some(e) = find::<FetchError>(err) {
            collector.collect_fetch_hints(e);
        } else if let Some(e) = find::<ExploreError>(err) {
            collector.collect_explore_hints(e);
        } else if let Some(e) = find::<DataError>(err) {
            collector.collect_data_hints(e);
        } else if let Some(e) = find::<ModelError>(err) {
            collector.collect_model_hints(e);
        } else if let Some(e) = find::<IoError>(err) {
            collector.collect_io_hints(e);
        }

        if !collector.has_typed_hints {
            collector.collect_fallback_hints(err);
        }

        if collector.hints.is_empty() {
            None
        } else {
            Some(collector.hints)
        }
    }

    fn add(&mut self, hint: impl Into<String>) {
        self.hints.push(hint.into());
    }

    fn mark_typed(&mut self) {
        self.has_typed_hints = true;
    }

    fn collect_fetch_hints(&mut self, err: &FetchError) {
        self.mark_typed();

        match err {
            FetchError::Http(e) => self.collect_http_hints(e),

            FetchError::Api(_) => {
                self.add("The server understood the request but refused it");
                self.add("Check the --prop name against the database's property list");
            }

            FetchError::Payload(_) | FetchError::Json(_) => {
                self.add("The response did not look like a REST envelope");
                self.add("Verify --endpoint points at the legacy v2 REST API");
            }

            FetchError::MalformedRecord { index, .. } => {
                self.add(format!("Document #{} lacks a required field", index));
                self.add("The requested property may not exist for every material");
            }

            FetchError::Write { path, source } => {
                self.add(format!("Could not write below '{}'", path.display()));
                self.collect_std_io_hints(source);
            }

            FetchError::DuplicateTaskId(id) => {
                self.add(format!("Task id '{}' was returned more than once", id));
                self.add("Remove the repeated record before writing outputs");
            }

            FetchError::InvalidProperty(_) => {
                self.add("--prop is used as a file name below --out");
                self.add("Use a bare property name without '/', '\\' or a leading '.'");
            }

            FetchError::Table(e) => self.collect_io_hints(e),
        }
    }

    fn collect_http_hints(&mut self, err: &reqwest::Error) {
        if let Some(status) = err.status() {
            match status.as_u16() {
                401 | 403 => {
                    self.add("The API key was rejected");
                    self.add("Copy the key from your Materials Project dashboard");
                }
                404 => {
                    self.add("The endpoint does not exist");
                    self.add("Check the --endpoint URL");
                }
                429 => {
                    self.add("Too many requests; wait before retrying");
                    self.add("A smaller --chunk-size lowers the load per request");
                }
                500..=599 => {
                    self.add("The server failed while answering the query");
                    self.add("Retry later or lower --chunk-size");
                }
                code => self.add(format!("The server answered with HTTP {}", code)),
            }
        } else if err.is_connect() {
            self.add("Could not connect to the server");
            self.add("Check network access and the --endpoint host name");
        } else if err.is_timeout() {
            self.add("The request timed out");
        } else if err.is_decode() {
            self.add("The response body could not be decoded");
        } else {
            self.add("HTTP transport failed");
            self.add("Check network access, proxies and TLS settings");
        }
    }

    fn collect_explore_hints(&mut self, err: &ExploreError) {
        self.mark_typed();

        match err {
            ExploreError::Settings(_) => {
                self.add("The --config file is not valid explore settings TOML");
                self.add("Allowed tables: [dataset], [loader], [model], [optimizer]");
                self.add("Unknown keys are rejected; check for misspelled names");
            }
            ExploreError::Data(e) => self.collect_data_hints(e),
            ExploreError::Model(e) => self.collect_model_hints(e),
            ExploreError::EmptyTrainingSet(n) => {
                self.add(format!("Only {} structure(s) are available for splitting", n));
                self.add("Fetch more structures or lower val_ratio/test_ratio in [loader]");
            }
        }
    }

    fn collect_data_hints(&mut self, err: &DataError) {
        self.mark_typed();

        match err {
            DataError::Open { source, .. } => {
                self.add("Run 'cforge fetch' first, or point --csv-dir at its output");
                self.collect_std_io_hints(source);
            }

            DataError::Read { source, .. } => self.collect_io_hints(source),

            DataError::Structure { id, source } => {
                self.add(format!("Check '{}.cif' in the CIF directory", id));
                self.collect_io_hints(source);
            }

            DataError::MissingAtomFeatures { element, .. } => {
                self.add(format!("atom_init.json has no entry for {}", element));
                self.add("Keys are atomic numbers as strings, e.g. \"11\" for Na");
            }

            DataError::EmptyStructure(_) => {
                self.add("The CIF file lists no atom sites");
            }

            DataError::EmptyDataset => {
                self.add("The summary table has no usable rows");
                self.add("Check that --prop matches the fetched property");
            }

            DataError::IndexOutOfRange { len, .. } => {
                self.add(format!("Pick an --index below {}", len));
            }

            DataError::InvalidSplit(_) => {
                self.add("Ratios in [loader] must not add up to more than 1");
                self.add("Explicit sizes must not exceed the dataset length");
            }

            DataError::InvalidFilter(_) => {
                self.add("[dataset] needs radius > dmin and step > 0");
            }

            DataError::TooFewSamples(_) => {
                self.add("Fitting the normalizer needs at least two structures");
            }

            DataError::WorkerPool(_) => {
                self.add("Set num_workers = 1 in [loader] to featurize serially");
            }

            DataError::Tensor(_) => {
                self.add("A tensor operation failed while featurizing");
            }
        }
    }

    fn collect_model_hints(&mut self, err: &ModelError) {
        self.mark_typed();

        match err {
            ModelError::InvalidConfig(_) => {
                self.add("Check the [model] table: sizes must be positive");
                self.add("dropout must lie in [0, 1)");
            }
            ModelError::UnknownPool(name) => {
                self.add(format!("'{}' is not a pooling function", name));
                self.add("Use one of: mean, sum, max");
            }
            ModelError::UnknownOptimizer(name) => {
                self.add(format!("'{}' is not an optimizer", name));
                self.add("Use one of: adam, sgd");
            }
            ModelError::Tensor(_) => {
                self.add("A tensor operation failed; shapes may be inconsistent");
            }
        }
    }

    fn collect_io_hints(&mut self, err: &IoError) {
        self.mark_typed();

        match err {
            IoError::Io { source } => self.collect_std_io_hints(source),

            IoError::Parse { format, line, .. } => {
                self.add(format!(
                    "Parser encountered an issue near line {} in {} data",
                    line, format
                ));
                self.add("Inspect the file around that line for malformed entries");
            }

            IoError::Csv(_) => {
                self.add("The summary table is not valid CSV");
                self.add("Expected header: full_formula,task_id,<prop>");
            }

            IoError::Json(_) => {
                self.add("atom_init.json must map atomic numbers to number arrays");
            }

            IoError::MissingColumn(name) => {
                self.add(format!("No '{}' column in the summary table", name));
                self.add("Pass the same --prop that was used for fetching");
            }

            IoError::PartialOccupancy { site, .. } => {
                self.add(format!("Site '{}' is disordered", site));
                self.add("Only ordered structures can be featurized");
            }
        }
    }

    fn collect_std_io_hints(&mut self, source: &std::io::Error) {
        use std::io::ErrorKind;

        match source.kind() {
            ErrorKind::NotFound => {
                self.add("File or directory not found");
                self.add("Check the path spelling and ensure the file exists");
            }

            ErrorKind::PermissionDenied => {
                self.add("Permission denied accessing the file");
                self.add("Check file permissions with `ls -la`");
            }

            ErrorKind::InvalidData => {
                self.add("File contains invalid or corrupt data");
                self.add("Verify the file is not truncated or corrupted");
            }

            ErrorKind::UnexpectedEof => {
                self.add("Unexpected end of file encountered");
                self.add("The file may be truncated or incomplete");
            }

            ErrorKind::WriteZero | ErrorKind::StorageFull => {
                self.add("Failed to write data (disk full?)");
                self.add("Check available disk space");
            }

            _ => {
                self.add("I/O operation failed");
                self.add("Check file path, permissions, and disk space");
            }
        }
    }

    fn collect_fallback_hints(&mut self, err: &Error) {
        let msg = error_chain_text(err);

        if msg.contains("no such file") || msg.contains("not found") {
            self.add("Check that the file path is correct");
            self.add("Verify the file exists and is readable");
            return;
        }

        if msg.contains("permission denied") {
            self.add("Check file permissions with `ls -la`");
            self.add("Ensure you have the required access rights");
        }
    }
}

fn error_chain_text(err: &Error) -> String {
    let mut text = String::new();

    for (i, cause) in err.chain().enumerate() {
        if i > 0 {
            text.push('\n');
        }
        text.push_str(&cause.to_string());
    }

    text.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn hints_found_through_context() {
        let err: Result<(), DataError> = Err(DataError::EmptyDataset);
        let err = err.context("Failed to open dataset").unwrap_err();
        let hints = HintCollector::collect(&err).unwrap();
        assert!(hints.iter().any(|h| h.contains("--prop")));
    }

    #[test]
    fn nested_data_error_in_explore_error() {
        let err = anyhow::Error::new(ExploreError::Data(DataError::IndexOutOfRange {
            index: 9,
            len: 4,
        }));
        let hints = HintCollector::collect(&err).unwrap();
        assert_eq!(hints, vec!["Pick an --index below 4".to_string()]);
    }

    #[test]
    fn fetch_output_errors_have_hints() {
        let err = anyhow::Error::new(FetchError::InvalidProperty("../x".into()));
        let hints = HintCollector::collect(&err).unwrap();
        assert!(hints.iter().any(|h| h.contains("--out")));

        let err = anyhow::Error::new(FetchError::DuplicateTaskId("mp-1".into()));
        let hints = HintCollector::collect(&err).unwrap();
        assert!(hints[0].contains("mp-1"));
    }

    #[test]
    fn untyped_errors_fall_back_to_text() {
        let err = anyhow::anyhow!("config file not found");
        let hints = HintCollector::collect(&err).unwrap();
        assert!(hints[0].contains("file path"));
    }

    #[test]
    fn no_hints_for_unknown_message() {
        assert!(HintCollector::collect(&anyhow::anyhow!("boom")).is_none());
    }
}
