use genomix_core::{
    feature::{Feature, FeatureType, Location, Qualifier, Strand},
    sequence::{GenomeRecord, Reference, Topology},
};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt},
    multi::separated_list1,
    sequence::{delimited, preceded, separated_pair},
    IResult,
};

use crate::ParseError;

const CONTINUATION: &str = "            ";
const QUALIFIER_INDENT: &str = "                     ";

/// Parse a GenBank format string into a GenomeRecord.
///
/// Only the first record is read; parsing stops at the `//` terminator.
pub fn parse(input: &str) -> Result<GenomeRecord, ParseError> {
    let mut record = GenomeRecord::new("", "", Topology::Linear);

    let lines: Vec<&str> = input.lines().collect();
    let mut seen_locus = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if line.starts_with("LOCUS") {
            parse_locus_line(line, &mut record);
            seen_locus = true;
        } else if line.starts_with("DEFINITION") {
            let def = read_continued(&lines, &mut i);
            record.description = def.trim_end_matches('.').to_string();
            continue;
        } else if line.starts_with("ACCESSION") {
            if record.accession.is_none() {
                record.accession = field_value(line)
                    .split_whitespace()
                    .next()
                    .map(str::to_string);
            }
        } else if line.starts_with("VERSION") {
            // VERSION carries the versioned accession (NC_000913.3), which wins
            if let Some(versioned) = field_value(line).split_whitespace().next() {
                record.accession = Some(versioned.to_string());
            }
        } else if line.starts_with("KEYWORDS") {
            record.metadata.keywords = Some(field_value(line).to_string());
        } else if line.starts_with("SOURCE") {
            record.metadata.source = Some(field_value(line).to_string());
            i += 1;
            if i < lines.len() && lines[i].trim_start().starts_with("ORGANISM") {
                record.organism = Some(lines[i].trim_start()[8..].trim().to_string());
                i += 1;
                let mut lineage = String::new();
                while i < lines.len() && lines[i].starts_with(CONTINUATION) {
                    lineage.push_str(lines[i].trim());
                    lineage.push(' ');
                    i += 1;
                }
                record.metadata.taxonomy = lineage
                    .split(';')
                    .map(|t| t.trim().trim_end_matches('.').to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
            }
            continue;
        } else if line.starts_with("COMMENT") {
            let mut comment = field_value(line).to_string();
            i += 1;
            while i < lines.len()
                && (lines[i].starts_with(CONTINUATION) || lines[i].trim().is_empty())
                && !lines[i].starts_with("FEATURES")
            {
                if lines[i].trim().is_empty() {
                    comment.push('\n');
                } else {
                    comment.push(' ');
                    comment.push_str(lines[i].trim());
                }
                i += 1;
            }
            record.metadata.comments.push(comment.trim().to_string());
            continue;
        } else if line.starts_with("REFERENCE") {
            let reference = parse_reference(&lines, &mut i);
            record.metadata.references.push(reference);
            continue;
        } else if line.starts_with("FEATURES") {
            i += 1;
            parse_features(&lines, &mut i, &mut record.features);
            continue;
        } else if line.starts_with("ORIGIN") {
            i += 1;
            record.sequence = parse_origin(&lines, &mut i);
            continue;
        } else if line.starts_with("//") {
            break;
        }

        i += 1;
    }

    if !seen_locus {
        return Err(ParseError::InvalidFormat(
            "missing LOCUS line".to_string(),
        ));
    }

    Ok(record)
}

/// Text after the 12-column keyword field.
fn field_value(line: &str) -> &str {
    line.get(12..).unwrap_or("").trim()
}

/// Read a keyword value plus its 12-space continuation lines.
fn read_continued(lines: &[&str], i: &mut usize) -> String {
    let mut value = field_value(lines[*i]).to_string();
    *i += 1;
    while *i < lines.len() && lines[*i].starts_with(CONTINUATION) {
        value.push(' ');
        value.push_str(lines[*i].trim());
        *i += 1;
    }
    value
}

fn parse_locus_line(line: &str, record: &mut GenomeRecord) {
    // LOCUS       name    length bp    type    topology    division    date
    let parts: Vec<&str> = line.split_whitespace().collect();

    if parts.len() >= 2 {
        record.name = parts[1].to_string();
    }

    for part in &parts {
        match *part {
            "circular" => record.topology = Topology::Circular,
            "linear" => record.topology = Topology::Linear,
            _ => {}
        }
    }

    for part in &parts {
        let lower = part.to_lowercase();
        if lower.contains("dna") || lower.contains("rna") {
            record.metadata.molecule_type = Some(part.to_string());
            break;
        }
    }

    // Division is the three-letter code after the topology
    if let Some(topo_idx) = parts.iter().position(|p| *p == "circular" || *p == "linear") {
        record.metadata.division = parts[topo_idx + 1..]
            .iter()
            .find(|p| p.len() == 3 && p.chars().all(|c| c.is_ascii_uppercase()))
            .map(|p| p.to_string());
    }

    if let Some(last) = parts.last() {
        if last.contains('-') && last.len() >= 9 {
            record.metadata.date = Some(last.to_string());
        }
    }
}

fn parse_reference(lines: &[&str], i: &mut usize) -> Reference {
    let number = lines[*i]
        .get(9..)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);

    let mut reference = Reference {
        number,
        authors: None,
        title: None,
        journal: None,
        pubmed: None,
    };

    *i += 1;
    while *i < lines.len() {
        let l = lines[*i];
        if l.starts_with(char::is_alphabetic) {
            break;
        }

        if l.starts_with("  AUTHORS") {
            reference.authors = Some(read_continued(lines, i));
            continue;
        } else if l.starts_with("  TITLE") {
            reference.title = Some(read_continued(lines, i));
            continue;
        } else if l.starts_with("  JOURNAL") {
            reference.journal = Some(read_continued(lines, i));
            continue;
        } else if l.starts_with("   PUBMED") {
            reference.pubmed = Some(field_value(l).to_string());
        }

        *i += 1;
    }

    reference
}

fn is_qualifier_continuation(line: &str) -> bool {
    line.starts_with(QUALIFIER_INDENT) && !line[21..].trim_start().starts_with('/')
}

fn is_qualifier_start(line: &str) -> bool {
    line.starts_with(QUALIFIER_INDENT) && line[21..].trim_start().starts_with('/')
}

fn parse_features(lines: &[&str], i: &mut usize, features: &mut Vec<Feature>) {
    while *i < lines.len() {
        let line = lines[*i];

        // Any keyword in column 0 ends the feature table
        if line.starts_with(char::is_alphabetic) || line.starts_with("//") {
            break;
        }

        if line.len() >= 21 && line.starts_with("     ") && !line[5..].starts_with(' ') {
            let key = line[5..21].trim();
            let mut location_str = line[21..].trim().to_string();

            *i += 1;
            while *i < lines.len() && is_qualifier_continuation(lines[*i]) {
                location_str.push_str(lines[*i][21..].trim());
                *i += 1;
            }

            let mut qualifiers = Vec::new();
            while *i < lines.len() && is_qualifier_start(lines[*i]) {
                let qual_line = lines[*i][21..].trim();
                let qual_content = &qual_line[1..];

                if let Some(eq_pos) = qual_content.find('=') {
                    let qkey = qual_content[..eq_pos].to_string();
                    let mut qval = qual_content[eq_pos + 1..].to_string();

                    *i += 1;
                    while *i < lines.len() && is_qualifier_continuation(lines[*i]) {
                        qval.push(' ');
                        qval.push_str(lines[*i][21..].trim());
                        *i += 1;
                    }

                    qualifiers.push(Qualifier {
                        key: qkey,
                        value: qval.trim_matches('"').to_string(),
                    });
                } else {
                    // Flag qualifier such as /pseudo
                    qualifiers.push(Qualifier {
                        key: qual_content.to_string(),
                        value: String::new(),
                    });
                    *i += 1;
                }
            }

            let (location, strand) = parse_location(&location_str);
            let feature_type = FeatureType::from_genbank_key(key);

            let name = ["gene", "locus_tag", "product", "label"]
                .iter()
                .find_map(|k| qualifiers.iter().find(|q| q.key == *k))
                .map(|q| q.value.clone())
                .unwrap_or_else(|| key.to_string());

            features.push(Feature {
                name,
                feature_type,
                location,
                strand,
                qualifiers,
            });
        } else {
            *i += 1;
        }
    }
}

/// Parse a GenBank location string into 0-based end-exclusive coordinates.
///
/// An outer `complement(...)` becomes [`Strand::Reverse`]. Strings the
/// grammar does not accept (remote references, `one-of`) yield an empty
/// location, which extraction later rejects.
pub fn parse_location(loc_str: &str) -> (Location, Strand) {
    match all_consuming(location)(loc_str.trim()) {
        Ok((_, Location::Complement { inner })) => (*inner, Strand::Reverse),
        Ok((_, loc)) => (loc, Strand::Forward),
        Err(_) => (Location::simple(0, 0), Strand::Forward),
    }
}

fn location(input: &str) -> IResult<&str, Location> {
    alt((
        map(
            delimited(tag("complement("), location, char(')')),
            |inner| Location::Complement {
                inner: Box::new(inner),
            },
        ),
        map(
            delimited(
                alt((tag("join("), tag("order("))),
                separated_list1(char(','), location),
                char(')'),
            ),
            join_parts,
        ),
        map(span, |(start, end)| Location::Simple { start, end }),
    ))(input)
}

fn position(input: &str) -> IResult<&str, usize> {
    preceded(
        opt(alt((char('<'), char('>')))),
        map_res(digit1, |digits: &str| digits.parse::<usize>()),
    )(input)
}

/// `a..b`, `a^b` or a single base, converted from 1-based inclusive.
fn span(input: &str) -> IResult<&str, (usize, usize)> {
    alt((
        map(separated_pair(position, tag(".."), position), |(s, e)| {
            (s.saturating_sub(1), e)
        }),
        // Between-base sites cover no bases
        map(separated_pair(position, char('^'), position), |(s, _)| (s, s)),
        map(position, |p| (p.saturating_sub(1), p)),
    ))(input)
}

/// Normalise the parts of a join into the simplest equivalent location.
fn join_parts(mut parts: Vec<Location>) -> Location {
    if parts.len() == 1 {
        return parts.remove(0);
    }

    let simple: Option<Vec<(usize, usize)>> = parts
        .iter()
        .map(|p| match p {
            Location::Simple { start, end } => Some((*start, *end)),
            _ => None,
        })
        .collect();
    if let Some(ranges) = simple {
        return Location::Join { ranges };
    }

    // join(complement(a),complement(b)) == complement(join(b,a))
    let complemented: Option<Vec<(usize, usize)>> = parts
        .iter()
        .rev()
        .map(|p| match p {
            Location::Complement { inner } => match inner.as_ref() {
                Location::Simple { start, end } => Some((*start, *end)),
                _ => None,
            },
            _ => None,
        })
        .collect();
    if let Some(ranges) = complemented {
        return Location::Complement {
            inner: Box::new(Location::Join { ranges }),
        };
    }

    let mut ranges = Vec::new();
    for part in &parts {
        flatten_ranges(part, &mut ranges);
    }
    Location::Join { ranges }
}

fn flatten_ranges(location: &Location, out: &mut Vec<(usize, usize)>) {
    match location {
        Location::Simple { start, end } => out.push((*start, *end)),
        Location::Join { ranges } => out.extend(ranges.iter().copied()),
        Location::Complement { inner } => flatten_ranges(inner, out),
    }
}

fn parse_origin(lines: &[&str], i: &mut usize) -> String {
    let mut seq = String::new();

    while *i < lines.len() {
        let line = lines[*i];
        if line.starts_with("//") {
            break;
        }

        // "        1 atcgatcg atcgatcg ..."
        for ch in line.chars() {
            if ch.is_ascii_alphabetic() {
                seq.push(ch.to_ascii_uppercase());
            }
        }

        *i += 1;
    }

    seq
}
