//! Result files written at the end of a CLI crawl

use crate::crawler::CrawlResults;
use crate::storage::SessionMetrics;
use crate::Result;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Layout of `PREFIX_results.json`
#[derive(Debug, Serialize)]
pub struct ResultsFile<'a> {
    pub subdomains: &'a [String],
    pub paths: &'a [String],
    pub visited_urls: &'a [String],
    pub stats: ResultsStats<'a>,
}

#[derive(Debug, Serialize)]
pub struct ResultsStats<'a> {
    pub total_subdomains: usize,
    pub total_paths: usize,
    pub total_visited: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<&'a SessionMetrics>,
}

/// Saves results to files named after `prefix`
///
/// With `json` set, writes `PREFIX_results.json`. Otherwise writes
/// `PREFIX_subdomains.txt` and `PREFIX_paths.txt` with one item per line.
///
/// # Returns
///
/// * `Ok(Vec<PathBuf>)` - The files written
/// * `Err(CrawlError)` - A file could not be written
pub fn save_results(
    prefix: &str,
    results: &CrawlResults,
    metrics: Option<&SessionMetrics>,
    json: bool,
) -> Result<Vec<PathBuf>> {
    if json {
        let path = PathBuf::from(format!("{}_results.json", prefix));
        let file = ResultsFile {
            subdomains: &results.subdomains,
            paths: &results.paths,
            visited_urls: &results.visited_urls,
            stats: ResultsStats {
                total_subdomains: results.subdomains.len(),
                total_paths: results.paths.len(),
                total_visited: results.visited_urls.len(),
                metrics,
            },
        };
        let body = serde_json::to_string_pretty(&file).map_err(std::io::Error::from)?;
        fs::write(&path, body)?;
        tracing::info!("JSON results saved to {}", path.display());
        return Ok(vec![path]);
    }

    let subdomains_path = PathBuf::from(format!("{}_subdomains.txt", prefix));
    write_lines(&subdomains_path, &results.subdomains)?;
    tracing::info!("Subdomains saved to {}", subdomains_path.display());

    let paths_path = PathBuf::from(format!("{}_paths.txt", prefix));
    write_lines(&paths_path, &results.paths)?;
    tracing::info!("Paths saved to {}", paths_path.display());

    Ok(vec![subdomains_path, paths_path])
}

fn write_lines(path: &PathBuf, lines: &[String]) -> std::io::Result<()> {
    let mut sorted: Vec<&String> = lines.iter().collect();
    sorted.sort();

    let mut file = fs::File::create(path)?;
    for line in sorted {
        writeln!(file, "{}", line)?;
    }
    Ok(())
}
