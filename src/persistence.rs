//! Saving networks and loading connectivity files.
//!
//! A saved network consists of a JSON [`Snapshot`] (`<path>`) holding the populations, every synapse, the seed
//! and simulated duration of the run, and the neuron states at the time of saving, plus one connectivity file
//! per projection (`<path>.ee.wmat`, `<path>.ei.wmat`, ...) in MatrixMarket coordinate format. The
//! connectivity files can be fed back to the benchmark (`--fee`, `--fei`, ...) to rerun the same topology.
//!
//! [`load`] accepts two layouts, one `(pre, post[, weight])` record per line:
//! - MatrixMarket coordinate files, recognized by their `%%MatrixMarket` banner, with 1-based indices and a
//!   `rows cols nnz` size line;
//! - plain triplet files with 0-based indices, where `#` and `%` start comment lines.
//!
//! If the weight of a record is missing, the nominal weight of the projection is used.
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::engine::NeuronStates;
use crate::error::BenchError;
use crate::network::network::Network;
use crate::network::population::PopulationKind;
use crate::network::projection::{EdgeSet, Projection, ProjectionId, Synapse};

const MATRIX_MARKET_BANNER: &str = "%%MatrixMarket";

/// A saved benchmark network with the run parameters and the neuron states it was saved with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    seed: u64,
    /// Simulated duration of the run (in seconds).
    simtime: f64,
    network: Network,
    /// Neuron states per population, empty if the engine does not expose them.
    states: Vec<NeuronStates>,
}

impl Snapshot {
    /// Bundle a network with its run parameters and neuron states.
    /// The function returns an error if a state does not match the size of its population or a population
    /// has more than one state.
    pub fn build(
        network: Network,
        seed: u64,
        simtime: f64,
        states: Vec<NeuronStates>,
    ) -> Result<Self, BenchError> {
        for (i, state) in states.iter().enumerate() {
            let size = network.population(state.kind()).size();
            if state.len() != size {
                return Err(BenchError::ConfigError(format!(
                    "{:?} state of {} neurons does not match a population of {} neurons",
                    state.kind(),
                    state.len(),
                    size
                )));
            }
            if states[..i].iter().any(|other| other.kind() == state.kind()) {
                return Err(BenchError::ConfigError(format!(
                    "duplicated {:?} state",
                    state.kind()
                )));
            }
        }

        Ok(Snapshot {
            seed,
            simtime,
            network,
            states,
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Returns the seed of the topology and initial state generators.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn simtime(&self) -> f64 {
        self.simtime
    }

    /// Returns the neuron states of a population, if they were saved.
    pub fn state(&self, kind: PopulationKind) -> Option<&NeuronStates> {
        self.states.iter().find(|state| state.kind() == kind)
    }
}

/// Returns the path of the connectivity file written next to the snapshot `path` for a projection.
pub fn connectivity_path(path: &Path, id: ProjectionId) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(format!(".{}.wmat", id.tag()));
    PathBuf::from(name)
}

/// Save the snapshot to `path` (JSON) and its projections to the sibling connectivity files.
/// Nothing is written if `path` is empty. Returns the paths of the written files.
pub fn save(path: &Path, snapshot: &Snapshot) -> Result<Vec<PathBuf>, BenchError> {
    if path.as_os_str().is_empty() {
        return Ok(vec![]);
    }

    let file = File::create(path)
        .map_err(|e| BenchError::IOError(format!("cannot create {}: {}", path.display(), e)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, snapshot)
        .map_err(|e| BenchError::IOError(e.to_string()))?;
    writer.flush()?;
    let mut written = vec![path.to_path_buf()];

    let network = snapshot.network();
    for projection in network.projections_iter() {
        let wmat_path = connectivity_path(path, projection.id());
        write_matrix_market(
            &wmat_path,
            projection,
            network.population(projection.id().source()).size(),
            network.population(projection.id().target()).size(),
        )?;
        written.push(wmat_path);
    }

    log::info!("Network saved to {}", path.display());
    Ok(written)
}

/// Load a snapshot previously written by [`save`].
pub fn load_snapshot(path: &Path) -> Result<Snapshot, BenchError> {
    let file = File::open(path)
        .map_err(|e| BenchError::LoadError(format!("cannot open {}: {}", path.display(), e)))?;
    let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| BenchError::LoadError(format!("{}: {}", path.display(), e)))?;

    // the snapshot may have been edited by hand
    rebuild(snapshot).map_err(|e| BenchError::LoadError(format!("{}: {}", path.display(), e)))
}

fn rebuild(snapshot: Snapshot) -> Result<Snapshot, BenchError> {
    let Snapshot {
        seed,
        simtime,
        network,
        states,
    } = snapshot;

    let network = Network::build(
        network.population(PopulationKind::Excitatory).clone(),
        network.population(PopulationKind::Inhibitory).clone(),
        network.projections_iter().cloned().collect(),
    )?;
    let states = states
        .iter()
        .map(|state| {
            NeuronStates::build(
                state.kind(),
                state.potentials().to_vec(),
                state.g_ampa().to_vec(),
                state.g_gaba().to_vec(),
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    Snapshot::build(network, seed, simtime, states)
}

fn write_matrix_market(
    path: &Path,
    projection: &Projection,
    source_size: usize,
    target_size: usize,
) -> Result<(), BenchError> {
    let file = File::create(path)
        .map_err(|e| BenchError::IOError(format!("cannot create {}: {}", path.display(), e)))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{} matrix coordinate real general", MATRIX_MARKET_BANNER)?;
    writeln!(writer, "% projection {}", projection.id().tag())?;
    writeln!(
        writer,
        "{} {} {}",
        source_size,
        target_size,
        projection.num_synapses()
    )?;
    for synapse in projection.synapses() {
        writeln!(
            writer,
            "{} {} {}",
            synapse.pre() + 1,
            synapse.post() + 1,
            synapse.weight()
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Load the synapses of one projection from a connectivity file.
///
/// The function returns a `LoadError` if the file cannot be opened, a record is malformed, an index lies
/// outside the source or target population, or the dimensions declared by a MatrixMarket file exceed the
/// populations. The synapses are only returned once the whole file was read.
pub fn load(
    path: &Path,
    source_size: usize,
    target_size: usize,
    default_weight: f64,
) -> Result<EdgeSet, BenchError> {
    let file = File::open(path)
        .map_err(|e| BenchError::LoadError(format!("cannot open {}: {}", path.display(), e)))?;
    let reader = BufReader::new(file);

    let error = |line_no: usize, msg: String| {
        BenchError::LoadError(format!("{}:{}: {}", path.display(), line_no + 1, msg))
    };

    let mut matrix_market = false;
    let mut declared_nnz: Option<usize> = None;
    let mut synapses = EdgeSet::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| error(line_no, e.to_string()))?;
        let line = line.trim();

        if line_no == 0 && line.starts_with(MATRIX_MARKET_BANNER) {
            if !line.contains("coordinate") {
                return Err(error(line_no, "only coordinate matrices are supported".into()));
            }
            matrix_market = true;
            continue;
        }
        if line.is_empty() || line.starts_with('%') || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();

        if matrix_market && declared_nnz.is_none() {
            let [rows, cols, nnz] = parse_size_line(&fields).map_err(|msg| error(line_no, msg))?;
            if rows > source_size || cols > target_size {
                return Err(error(
                    line_no,
                    format!(
                        "matrix of size {} x {} exceeds populations of size {} x {}",
                        rows, cols, source_size, target_size
                    ),
                ));
            }
            let max_entries = rows.checked_mul(cols).unwrap_or(usize::MAX);
            if nnz > max_entries {
                return Err(error(
                    line_no,
                    format!(
                        "{} entries do not fit in a matrix of size {} x {}",
                        nnz, rows, cols
                    ),
                ));
            }
            declared_nnz = Some(nnz);
            continue;
        }

        let synapse = parse_record(&fields, matrix_market, default_weight)
            .map_err(|msg| error(line_no, msg))?;
        if synapse.pre() >= source_size || synapse.post() >= target_size {
            return Err(error(
                line_no,
                format!(
                    "synapse ({}, {}) lies outside populations of size {} x {}",
                    synapse.pre(),
                    synapse.post(),
                    source_size,
                    target_size
                ),
            ));
        }
        synapses.push(synapse);
    }

    if matrix_market {
        match declared_nnz {
            None => {
                return Err(BenchError::LoadError(format!(
                    "{}: missing size line",
                    path.display()
                )))
            }
            Some(nnz) if nnz != synapses.len() => {
                return Err(BenchError::LoadError(format!(
                    "{}: declared {} entries but found {}",
                    path.display(),
                    nnz,
                    synapses.len()
                )))
            }
            _ => {}
        }
    }

    Ok(synapses)
}

fn parse_size_line(fields: &[&str]) -> Result<[usize; 3], String> {
    if fields.len() != 3 {
        return Err(format!("expected a size line `rows cols nnz`, got {:?}", fields));
    }
    let mut size = [0; 3];
    for (value, field) in size.iter_mut().zip(fields) {
        *value = field
            .parse()
            .map_err(|e| format!("invalid size {:?}: {}", field, e))?;
    }
    Ok(size)
}

fn parse_record(fields: &[&str], one_based: bool, default_weight: f64) -> Result<Synapse, String> {
    if fields.len() < 2 || fields.len() > 3 {
        return Err(format!("expected `pre post [weight]`, got {:?}", fields));
    }

    let mut indices = [0usize; 2];
    for (index, field) in indices.iter_mut().zip(fields) {
        let value: usize = field
            .parse()
            .map_err(|e| format!("invalid index {:?}: {}", field, e))?;
        *index = if one_based {
            value
                .checked_sub(1)
                .ok_or_else(|| "indices are 1-based in MatrixMarket files".to_string())?
        } else {
            value
        };
    }

    let weight = match fields.get(2) {
        Some(field) => field
            .parse::<f64>()
            .map_err(|e| format!("invalid weight {:?}: {}", field, e))?,
        None => default_weight,
    };
    if !weight.is_finite() {
        return Err(format!("weight must be finite, got {}", weight));
    }

    Ok(Synapse::new(indices[0], indices[1], weight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_plain_triplets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ee.txt");
        fs::write(&path, "# pre post weight\n0 1 0.5\n\n3 2\n").unwrap();

        let synapses = load(&path, 4, 3, 0.4).unwrap();
        assert_eq!(
            synapses,
            vec![Synapse::new(0, 1, 0.5), Synapse::new(3, 2, 0.4)]
        );
    }

    #[test]
    fn test_load_matrix_market() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ee.wmat");
        fs::write(
            &path,
            "%%MatrixMarket matrix coordinate real general\n% comment\n4 3 2\n1 2 0.5\n4 3 0.25\n",
        )
        .unwrap();

        let synapses = load(&path, 4, 3, 0.4).unwrap();
        assert_eq!(
            synapses,
            vec![Synapse::new(0, 1, 0.5), Synapse::new(3, 2, 0.25)]
        );
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();

        assert!(matches!(
            load(&dir.path().join("missing.wmat"), 4, 4, 0.4),
            Err(BenchError::LoadError(_))
        ));

        let cases = [
            // malformed record
            "0 x 0.5\n",
            // too many fields
            "0 1 0.5 7\n",
            // index out of range
            "0 4 0.5\n",
            // non-finite weight
            "0 1 inf\n",
            // declared dimensions exceed the populations
            "%%MatrixMarket matrix coordinate real general\n5 4 0\n",
            // zero index in a 1-based file
            "%%MatrixMarket matrix coordinate real general\n4 4 1\n0 1 0.5\n",
            // entry count does not match
            "%%MatrixMarket matrix coordinate real general\n4 4 2\n1 1 0.5\n",
            // missing size line
            "%%MatrixMarket matrix coordinate real general\n% nothing\n",
            // more entries than the declared matrix can hold
            "%%MatrixMarket matrix coordinate real general\n4 4 17\n1 1 0.5\n",
            "%%MatrixMarket matrix coordinate real general\n4 4 18446744073709551615\n1 1 0.5\n",
        ];
        for (i, content) in cases.iter().enumerate() {
            let path = dir.path().join(format!("case{}.wmat", i));
            fs::write(&path, content).unwrap();
            assert!(
                matches!(load(&path, 4, 4, 0.4), Err(BenchError::LoadError(_))),
                "case {} should fail",
                i
            );
        }
    }

    #[test]
    fn test_connectivity_path() {
        assert_eq!(
            connectivity_path(Path::new("/tmp/net.json"), ProjectionId::IE),
            PathBuf::from("/tmp/net.json.ie.wmat")
        );
    }

    fn small_network() -> Network {
        use crate::network::population::NeuronPopulation;
        use crate::network::projection::{ProjectionOrigin, TransmitterKind};

        let projections = ProjectionId::ALL
            .iter()
            .map(|&id| {
                Projection::build(
                    id,
                    1.0,
                    TransmitterKind::of_source(id.source()),
                    ProjectionOrigin::Random { sparseness: 0.1 },
                    vec![Synapse::new(0, 1, 1.0)],
                )
                .unwrap()
            })
            .collect();
        Network::build(
            NeuronPopulation::build(PopulationKind::Excitatory, 2, 1, 5e-3, 2e-2).unwrap(),
            NeuronPopulation::build(PopulationKind::Inhibitory, 2, 1, 5e-3, 2e-2).unwrap(),
            projections,
        )
        .unwrap()
    }

    fn states(kind: PopulationKind, potentials: Vec<f64>) -> NeuronStates {
        let zeros = vec![0.0; potentials.len()];
        NeuronStates::build(kind, potentials, zeros.clone(), zeros).unwrap()
    }

    #[test]
    fn test_save_empty_path_is_noop() {
        let snapshot = Snapshot::build(small_network(), 1, 20.0, vec![]).unwrap();
        assert_eq!(save(Path::new(""), &snapshot).unwrap(), Vec::<PathBuf>::new());
    }

    #[test]
    fn test_snapshot_keeps_seed_and_states() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("net.json");
        let snapshot = Snapshot::build(
            small_network(),
            42,
            0.5,
            vec![states(PopulationKind::Inhibitory, vec![-0.055, -0.051])],
        )
        .unwrap();

        let written = save(&path, &snapshot).unwrap();
        assert_eq!(written.len(), 5);
        assert!(written.iter().all(|p| p.exists()));

        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.seed(), 42);
        assert_eq!(loaded.simtime(), 0.5);
        assert!(loaded.state(PopulationKind::Excitatory).is_none());
        assert_eq!(
            loaded.state(PopulationKind::Inhibitory).unwrap().potentials(),
            &[-0.055, -0.051]
        );

        // connectivity files are 1-based and hold the declared sizes
        let ee = load(&connectivity_path(&path, ProjectionId::EE), 2, 2, 0.4).unwrap();
        assert_eq!(ee, vec![Synapse::new(0, 1, 1.0)]);
    }

    #[test]
    fn test_snapshot_states_must_match_populations() {
        let network = small_network();
        assert!(matches!(
            Snapshot::build(
                network.clone(),
                1,
                1.0,
                vec![states(PopulationKind::Excitatory, vec![-0.06])]
            ),
            Err(BenchError::ConfigError(_))
        ));
        assert!(matches!(
            Snapshot::build(
                network,
                1,
                1.0,
                vec![
                    states(PopulationKind::Excitatory, vec![-0.06, -0.06]),
                    states(PopulationKind::Excitatory, vec![-0.06, -0.06]),
                ]
            ),
            Err(BenchError::ConfigError(_))
        ));
        assert!(NeuronStates::build(PopulationKind::Excitatory, vec![0.0], vec![], vec![0.0]).is_err());
    }

    #[test]
    fn test_load_snapshot_rejects_inconsistent_states() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("net.json");
        let snapshot = Snapshot::build(
            small_network(),
            1,
            1.0,
            vec![states(PopulationKind::Excitatory, vec![-0.06, -0.06])],
        )
        .unwrap();
        save(&path, &snapshot).unwrap();

        let mut json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        json["states"][0]["g_ampa"] = serde_json::json!([0.0]);
        fs::write(&path, json.to_string()).unwrap();

        assert!(matches!(
            load_snapshot(&path),
            Err(BenchError::LoadError(_))
        ));
    }
}
