use anyhow::{Context, Result};
use genomix_pipeline::AnalysisService;

use super::print_json;

pub async fn search(service: &AnalysisService, query: &str, max_results: usize, json: bool) -> Result<()> {
    let hits = service
        .search(query, max_results)
        .await
        .with_context(|| format!("search for {query:?} failed"))?;

    if json {
        return print_json(&hits);
    }
    if hits.is_empty() {
        println!("No complete genomes found for {query:?}.");
        return Ok(());
    }
    println!("{:<16} {:>12}  {:<12} ORGANISM", "ACCESSION", "LENGTH", "UPDATED");
    for hit in &hits {
        println!(
            "{:<16} {:>12}  {:<12} {}",
            hit.accession, hit.length, hit.update_date, hit.organism
        );
    }
    Ok(())
}

pub async fn metadata(service: &AnalysisService, accession: &str, json: bool) -> Result<()> {
    let meta = service
        .genome_metadata(accession)
        .await
        .with_context(|| format!("could not fetch metadata for {accession}"))?;

    if json {
        return print_json(&meta);
    }
    println!("accession:   {}", meta.accession);
    println!("title:       {}", meta.title);
    println!("organism:    {}", meta.organism);
    println!("length:      {} bp", meta.length);
    println!("created:     {}", meta.create_date);
    println!("updated:     {}", meta.update_date);
    if let Some(taxid) = meta.taxonomy_id {
        println!("taxonomy id: {taxid}");
    }
    Ok(())
}
