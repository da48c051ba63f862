use anyhow::Result;
use genomix_pipeline::AnalysisService;

use super::print_json;
use crate::dto::ReferenceDto;

pub fn list(service: &AnalysisService, accession: Option<&str>, json: bool) -> Result<()> {
    let references = service.references();
    let dtos: Vec<ReferenceDto> = match accession {
        Some(acc) => {
            let Some(reference) = service.reference(acc) else {
                anyhow::bail!("no reference data for {acc}");
            };
            vec![ReferenceDto::new(acc, reference)]
        }
        None => references
            .accessions()
            .into_iter()
            .filter_map(|acc| references.get(acc).map(|r| ReferenceDto::new(acc, r)))
            .collect(),
    };

    if json {
        return print_json(&dtos);
    }
    if dtos.is_empty() {
        println!("No reference genomes loaded.");
        return Ok(());
    }
    for dto in &dtos {
        println!("{}  {}", dto.accession, dto.organism);
        if let Some(size) = dto.genome_size {
            println!("    genome size: {size} bp");
        }
        if let Some(gc) = dto.gc_content {
            println!("    GC content:  {gc}%");
        }
        if let Some(genes) = dto.gene_count {
            println!("    genes:       {genes}");
        }
        println!("    source:      {}", dto.citation);
    }
    Ok(())
}
