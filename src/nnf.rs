//! Reading and writing circuits in the `.nnf` text format of c2d and dsharp.
//!
//! ```text
//! nnf <nodes> <edges> <vars>
//! L <literal>             # literal node, signed variable index
//! A <k> <c1> .. <ck>      # conjunction, `A 0` is true
//! O <j> <k> <c1> .. <ck>  # disjunction deciding on variable j (0 if unknown), `O 0 0` is false
//! ```
//!
//! Node ids are 0-based line positions; children refer to earlier nodes and the
//! last node is the root. Lines starting with `c` are comments.
//!
//! The decision variable `j` of a disjunction is checked and then discarded:
//! [`NodeKind::Or`] keeps only the children, so [`to_nnf_string`] writes every
//! disjunction as `O 0 ..`.
//!
//! The format carries no atom names or weights. Set those on the parsed circuit
//! with [`NnfCircuit::set_name`] and [`NnfCircuit::set_weight`].

use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::Path;

use crate::circuit::{Circuit, NnfCircuit, NodeId, NodeKind};
use crate::error::{Error, Result};
use crate::key::Key;

/// Parses a circuit from `.nnf` text.
pub fn parse_nnf(content: &str) -> Result<NnfCircuit> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('c'));

    let (header_line, header) = lines.next().ok_or_else(|| Error::Parse {
        line: 0,
        message: "missing header".into(),
    })?;
    let parts: Vec<&str> = header.split_whitespace().collect();
    if parts.len() != 4 || parts[0] != "nnf" {
        return Err(Error::Parse {
            line: header_line,
            message: format!("invalid header: {}", header),
        });
    }
    let node_count: usize = number(header_line, parts[1], "node count")?;

    let mut nodes: Vec<NodeKind> = Vec::new();
    for (line_no, line) in lines {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let node = match parts[0] {
            "L" => {
                if parts.len() != 2 {
                    return Err(Error::Parse {
                        line: line_no,
                        message: format!("literal expects one argument: {}", line),
                    });
                }
                let lit: i32 = number(line_no, parts[1], "literal")?;
                if lit == 0 || lit == i32::MIN {
                    return Err(Error::Parse {
                        line: line_no,
                        message: format!("literal {} is not a variable", lit),
                    });
                }
                NodeKind::Literal(Key::new(lit))
            }
            "A" => {
                let children = children(line_no, &parts[1..], nodes.len())?;
                if children.is_empty() {
                    NodeKind::True
                } else {
                    NodeKind::And(children)
                }
            }
            "O" => {
                if parts.len() < 2 {
                    return Err(Error::Parse {
                        line: line_no,
                        message: format!("disjunction misses its decision variable: {}", line),
                    });
                }
                let _decided: u32 = number(line_no, parts[1], "decision variable")?;
                let children = children(line_no, &parts[2..], nodes.len())?;
                if children.is_empty() {
                    NodeKind::False
                } else {
                    NodeKind::Or(children)
                }
            }
            other => {
                return Err(Error::Parse {
                    line: line_no,
                    message: format!("unknown node type: {}", other),
                })
            }
        };
        nodes.push(node);
    }

    if nodes.len() != node_count {
        return Err(Error::Parse {
            line: header_line,
            message: format!("header announces {} nodes, found {}", node_count, nodes.len()),
        });
    }
    if nodes.is_empty() {
        return Err(Error::Parse {
            line: header_line,
            message: "circuit has no nodes".into(),
        });
    }
    let root = nodes.len() - 1;
    NnfCircuit::from_nodes(nodes, root)
}

fn number<T: std::str::FromStr>(line: usize, token: &str, what: &str) -> Result<T> {
    token.parse().map_err(|_| Error::Parse {
        line,
        message: format!("invalid {}: {}", what, token),
    })
}

/// Parses `k c1 .. ck`, checking that every child precedes the current node.
fn children(line: usize, parts: &[&str], current: NodeId) -> Result<Vec<NodeId>> {
    let Some((count, rest)) = parts.split_first() else {
        return Err(Error::Parse {
            line,
            message: "missing child count".into(),
        });
    };
    let count: usize = number(line, count, "child count")?;
    if rest.len() != count {
        return Err(Error::Parse {
            line,
            message: format!("expected {} children, found {}", count, rest.len()),
        });
    }
    rest.iter()
        .map(|t| {
            let c: NodeId = number(line, t, "child")?;
            if c >= current {
                return Err(Error::Parse {
                    line,
                    message: format!("child {} does not precede node {}", c, current),
                });
            }
            Ok(c)
        })
        .collect()
}

/// Serialises the nodes up to and including the root.
pub fn to_nnf_string(circuit: &NnfCircuit) -> String {
    let nodes = &circuit.nodes()[..=circuit.root()];
    let edges: usize = nodes.iter().map(|n| n.children().len()).sum();

    let mut output = String::new();
    let _ = writeln!(output, "nnf {} {} {}", nodes.len(), edges, circuit.num_vars());
    for node in nodes {
        let _ = match node {
            NodeKind::True => writeln!(output, "A 0"),
            NodeKind::False => writeln!(output, "O 0 0"),
            NodeKind::Literal(k) => writeln!(output, "L {}", k.get()),
            NodeKind::And(cs) => writeln!(output, "A {} {}", cs.len(), join(cs)),
            NodeKind::Or(cs) => writeln!(output, "O 0 {} {}", cs.len(), join(cs)),
        };
    }
    output
}

fn join(children: &[NodeId]) -> String {
    children.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" ")
}

/// Reads a circuit from a `.nnf` file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<NnfCircuit> {
    let content = fs::read_to_string(path)?;
    parse_nnf(&content)
}

/// Writes a circuit to a `.nnf` file.
pub fn save<P: AsRef<Path>>(circuit: &NnfCircuit, path: P) -> Result<()> {
    fs::write(path, to_nnf_string(circuit))?;
    Ok(())
}
