use chrono::Local;
use csv::Writer;
use log::{info, warn};
use nalgebra::{DMatrix, DVector};
use simplelog::*;
use std::fs::File;
use std::io;

/// Parse a log level name: "debug", "info", "warn", "error", "off"/"none".
/// None means "info"; unknown names fall back to "info".
pub fn parse_loglevel(loglevel: Option<&str>) -> LevelFilter {
    match loglevel {
        None => LevelFilter::Info,
        Some("off") | Some("none") => LevelFilter::Off,
        Some("debug") => LevelFilter::Debug,
        Some("info") => LevelFilter::Info,
        Some("warn") => LevelFilter::Warn,
        Some("error") => LevelFilter::Error,
        Some(other) => {
            eprintln!("unknown loglevel {}, using info", other);
            LevelFilter::Info
        }
    }
}

/// Install a terminal logger and, if `log_to_file`, a file logger writing to
/// `log_<date>_<time>.txt`. A logger installed earlier is kept.
pub fn init_logger(loglevel: Option<&str>, log_to_file: bool) {
    let level = parse_loglevel(loglevel);
    if level == LevelFilter::Off {
        return;
    }
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    let mut file_error = None;
    if log_to_file {
        let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let name = format!("log_{}.txt", date_and_time);
        match File::create(&name) {
            Ok(file) => loggers.push(WriteLogger::new(level, Config::default(), file)),
            Err(e) => file_error = Some((name, e)),
        }
    }
    // a second init fails because a logger is already set, which is fine
    if CombinedLogger::init(loggers).is_ok() {
        info!("logger started with loglevel: {}", level);
    }
    if let Some((name, e)) = file_error {
        warn!("could not create log file {}: {}", name, e);
    }
}

/// Write `matrix` (one row per point of `x_mesh`) into a csv file with
/// header `arg, headers...`
pub fn save_matrix_to_csv(
    matrix: &DMatrix<f64>,
    headers: &[String],
    filename: &str,
    x_mesh: &DVector<f64>,
    arg: &str,
) -> io::Result<()> {
    if matrix.nrows() != x_mesh.len() || matrix.ncols() != headers.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "matrix {:?} does not fit {} mesh points and {} headers",
                matrix.shape(),
                x_mesh.len(),
                headers.len()
            ),
        ));
    }
    let file = File::create(filename)?;
    let mut writer = Writer::from_writer(file);

    let mut headers_with_x = Vec::new();
    headers_with_x.push(arg.to_string());
    headers_with_x.extend(headers.iter().cloned());
    writer.write_record(&headers_with_x)?;

    for (i, row) in matrix.row_iter().enumerate() {
        let mut row_data = Vec::new();
        row_data.push(x_mesh[i].to_string());
        row_data.extend(row.iter().map(|&val| val.to_string()));
        writer.write_record(&row_data)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_loglevel() {
        assert_eq!(parse_loglevel(None), LevelFilter::Info);
        assert_eq!(parse_loglevel(Some("off")), LevelFilter::Off);
        assert_eq!(parse_loglevel(Some("debug")), LevelFilter::Debug);
        assert_eq!(parse_loglevel(Some("warn")), LevelFilter::Warn);
        assert_eq!(parse_loglevel(Some("whatever")), LevelFilter::Info);
    }

    #[test]
    fn test_save_matrix_to_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("result.csv");
        let filename = path.to_str().unwrap();
        let matrix = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.5, -0.5]);
        let t = DVector::from_vec(vec![0.0, 0.1]);
        let headers = vec!["x".to_string(), "v".to_string()];
        save_matrix_to_csv(&matrix, &headers, filename, &t, "t").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["t,x,v", "0,1,0", "0.1,0.5,-0.5"]);
    }

    #[test]
    fn test_save_matrix_shape_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        let matrix = DMatrix::zeros(3, 2);
        let t = DVector::zeros(2);
        let headers = vec!["x".to_string(), "v".to_string()];
        let err = save_matrix_to_csv(&matrix, &headers, path.to_str().unwrap(), &t, "t")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(!path.exists());
    }
}
