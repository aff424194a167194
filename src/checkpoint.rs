//! Save/load for trained networks.
//!
//! Line-oriented text format, one value per header line:
//!
//! ```text
//! <inputs>
//! <hidden layer count>
//! <hidden size>            (one line per hidden layer)
//! <outputs>
//! <hidden activation ordinal>
//! <output activation ordinal>
//! <w w w ... >             (one line per weight row, layer 0 first)
//! ```
//!
//! Weights are written with the shortest representation that parses back to
//! the same `f64`, so a save/load cycle is bit-exact. The network name is not
//! part of the format.

use crate::core::{Activation, Matrix, NetError, NetResult, Network, NeuroStructure};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

/// Auto-save file name: `<name>_<epoch>_<error>.txt`.
pub fn checkpoint_file_name(name: &str, epoch: usize, error: f64) -> String {
    format!("{name}_{epoch}_{error:.6}.txt")
}

/// Render a network in the text format.
pub fn to_text(network: &Network) -> String {
    let structure = network.structure();
    let mut header = vec![structure.inputs, structure.hiddens.len()];
    header.extend_from_slice(&structure.hiddens);
    header.push(structure.outputs);
    header.push(usize::from(structure.hidden_activation.ordinal()));
    header.push(usize::from(structure.output_activation.ordinal()));

    let mut out = String::new();
    for value in header {
        out.push_str(&format!("{value}\n"));
    }
    for layer in network.layers() {
        for row in layer.as_array().rows() {
            for value in row {
                out.push_str(&format!("{value} "));
            }
            out.push('\n');
        }
    }
    out
}

/// Write a network in the text format.
///
/// # Errors
/// - `Io` if the writer fails
pub fn write_network<W: Write>(network: &Network, mut writer: W) -> NetResult<()> {
    writer.write_all(to_text(network).as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Read a network in the text format.
///
/// # Errors
/// - `Io` if the reader fails
/// - see [`from_text`]
pub fn read_network<R: Read>(mut reader: R) -> NetResult<Network> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    from_text(&text)
}

/// Parse a network from the text format.
///
/// # Errors
/// - `Format` if a line is missing or non-numeric, a row has the wrong number
///   of values, or non-blank content follows the last row
/// - `Configuration` if an activation ordinal is unknown or the topology is invalid
pub fn from_text(text: &str) -> NetResult<Network> {
    let mut cursor = Cursor::new(text);

    let inputs = cursor.value::<usize>("input count")?;
    let hidden_count = cursor.value::<usize>("hidden layer count")?;
    let mut hiddens = Vec::new();
    while hiddens.len() < hidden_count {
        let line = cursor.line("hidden layer size")?;
        for token in line.split_whitespace() {
            if hiddens.len() == hidden_count {
                return Err(cursor.error("too many hidden layer sizes"));
            }
            hiddens.push(cursor.parse::<usize>(token, "hidden layer size")?);
        }
    }
    let outputs = cursor.value::<usize>("output count")?;
    let hidden_activation = Activation::from_ordinal(cursor.value("hidden activation")?)?;
    let output_activation = Activation::from_ordinal(cursor.value("output activation")?)?;

    let structure = NeuroStructure::new(inputs, hiddens, outputs)
        .hidden_activation(hidden_activation)
        .output_activation(output_activation);
    structure.validate()?;

    let mut layers = Vec::new();
    for (rows, cols) in structure.layer_shapes() {
        let mut values = Vec::new();
        for _ in 0..rows {
            let line = cursor.line("weight row")?;
            let row = line
                .split_whitespace()
                .map(|token| cursor.parse::<f64>(token, "weight"))
                .collect::<NetResult<Vec<_>>>()?;
            if row.len() != cols {
                return Err(cursor.error(&format!(
                    "expected {cols} weights in row, found {}",
                    row.len()
                )));
            }
            values.push(row);
        }
        layers.push(Matrix::from_rows(&values)?);
    }

    cursor.finish()?;
    Network::from_layers(structure, layers)
}

/// Save a network to `path`, creating parent directories as needed.
///
/// # Errors
/// - `Io` if the directory or file cannot be written
pub fn save_network(network: &Network, path: &Path) -> NetResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    write_network(network, BufWriter::new(File::create(path)?))
}

/// Load a network from `path`.
///
/// # Errors
/// - `Io` if the file cannot be read
/// - see [`from_text`]
pub fn load_network(path: &Path) -> NetResult<Network> {
    read_network(BufReader::new(File::open(path)?))
}

/// Line reader that tracks the 1-based line number for error reports.
struct Cursor<'a> {
    lines: std::str::Lines<'a>,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            line: 0,
        }
    }

    fn line(&mut self, what: &str) -> NetResult<&'a str> {
        match self.lines.next() {
            Some(line) => {
                self.line += 1;
                Ok(line)
            }
            None => Err(NetError::Format {
                line: self.line + 1,
                message: format!("missing {what}"),
            }),
        }
    }

    fn value<T: FromStr>(&mut self, what: &str) -> NetResult<T> {
        let line = self.line(what)?;
        self.parse(line.trim(), what)
    }

    fn parse<T: FromStr>(&self, token: &str, what: &str) -> NetResult<T> {
        token
            .parse()
            .map_err(|_| self.error(&format!("invalid {what}: {token:?}")))
    }

    fn error(&self, message: &str) -> NetError {
        NetError::Format {
            line: self.line,
            message: message.to_string(),
        }
    }

    /// Only blank lines may follow the last weight row.
    fn finish(mut self) -> NetResult<()> {
        while let Some(line) = self.lines.next() {
            self.line += 1;
            if !line.trim().is_empty() {
                return Err(self.error("unexpected data after last weight row"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_network() -> Network {
        let structure = NeuroStructure::new(3, vec![4, 2], 2)
            .hidden_activation(Activation::Tanh)
            .output_activation(Activation::Identity)
            .name("sample");
        Network::new(structure, &mut StdRng::seed_from_u64(11)).unwrap()
    }

    fn small_text() -> String {
        "2\n1\n2\n1\n0\n3\n0.5 -0.25 \n1 2 \n3 4 \n".to_string()
    }

    #[test]
    fn test_text_layout() {
        let net = from_text(&small_text()).unwrap();
        assert_eq!(net.structure().inputs, 2);
        assert_eq!(net.structure().hiddens, vec![2]);
        assert_eq!(net.structure().outputs, 1);
        assert_eq!(net.structure().hidden_activation, Activation::Sigmoid);
        assert_eq!(net.structure().output_activation, Activation::Identity);
        assert_eq!(net.layers()[0].as_array().row(0).to_vec(), vec![0.5, -0.25]);
        assert_eq!(net.layers()[1].as_array().row(0).to_vec(), vec![3.0, 4.0]);
        assert_eq!(to_text(&net), "2\n1\n2\n1\n0\n3\n0.5 -0.25 \n1 2 \n3 4 \n");
    }

    #[test]
    fn test_write_network_matches_text() {
        let net = sample_network();
        let mut buf = Vec::new();
        write_network(&net, &mut buf).unwrap();
        let written = String::from_utf8(buf).unwrap();

        assert_eq!(written, to_text(&net));
        assert!(written.starts_with("3\n2\n4\n2\n2\n1\n3\n"));
        // Output layer is untrained, so its two rows are all zeros.
        assert!(written.ends_with("0 0 \n0 0 \n"));
        assert_eq!(written.lines().count(), 7 + 4 + 2 + 2);
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let net = sample_network();
        let loaded = from_text(&to_text(&net)).unwrap();

        assert_eq!(loaded.structure().hiddens, net.structure().hiddens);
        assert_eq!(
            loaded.structure().hidden_activation,
            net.structure().hidden_activation
        );
        assert_eq!(loaded.name(), None);
        for (a, b) in net.layers().iter().zip(loaded.layers()) {
            for (x, y) in a.as_array().iter().zip(b.as_array()) {
                assert_eq!(x.to_bits(), y.to_bits());
            }
        }
    }

    #[test]
    fn test_file_round_trip() {
        let net = sample_network();
        let dir = std::env::temp_dir().join("ffnn_test_checkpoint");
        let path = dir.join("nested").join("net.txt");

        save_network(&net, &path).unwrap();
        let loaded = load_network(&path).unwrap();
        assert_eq!(loaded.layers(), net.layers());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_hidden_sizes_on_one_line() {
        let text = "1\n2\n1 1\n1\n0\n0\n0.1 \n0.2 \n0.3 \n";
        let net = from_text(text).unwrap();
        assert_eq!(net.structure().hiddens, vec![1, 1]);
    }

    #[test]
    fn test_trailing_blank_lines_ignored() {
        let text = format!("{}\n\n   \n", small_text());
        assert!(from_text(&text).is_ok());
    }

    #[test]
    fn test_truncated_file() {
        let text = "2\n1\n2\n1\n0\n3\n0.5 -0.25 \n1 2 \n";
        assert!(matches!(
            from_text(text),
            Err(NetError::Format { line: 9, .. })
        ));
        assert!(matches!(from_text(""), Err(NetError::Format { line: 1, .. })));
    }

    #[test]
    fn test_non_numeric_value() {
        let text = small_text().replace("-0.25", "abc");
        assert!(matches!(
            from_text(&text),
            Err(NetError::Format { line: 7, .. })
        ));
        assert!(matches!(
            from_text("two\n"),
            Err(NetError::Format { line: 1, .. })
        ));
    }

    #[test]
    fn test_row_width_must_match() {
        let short = small_text().replace("1 2 \n", "1 \n");
        assert!(matches!(
            from_text(&short),
            Err(NetError::Format { line: 8, .. })
        ));
        let long = small_text().replace("1 2 \n", "1 2 5 \n");
        assert!(matches!(
            from_text(&long),
            Err(NetError::Format { line: 8, .. })
        ));
    }

    #[test]
    fn test_trailing_data_rejected() {
        let text = format!("{}7 7\n", small_text());
        assert!(matches!(
            from_text(&text),
            Err(NetError::Format { line: 10, .. })
        ));
    }

    #[test]
    fn test_unknown_activation_ordinal() {
        let text = small_text().replace("\n0\n3\n", "\n0\n9\n");
        assert!(matches!(
            from_text(&text),
            Err(NetError::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_hidden_layers_rejected() {
        assert!(matches!(
            from_text("2\n0\n1\n0\n0\n"),
            Err(NetError::Configuration(_))
        ));
    }

    #[test]
    fn test_checkpoint_file_name() {
        assert_eq!(checkpoint_file_name("and", 100, 0.5), "and_100_0.500000.txt");
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("ffnn_missing").join("none.txt");
        assert!(matches!(load_network(&path), Err(NetError::Io(_))));
    }
}
