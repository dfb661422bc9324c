//! 内置静态语料：进程内检索后端
//!
//! 用于离线运行与测试。打分是简单的词项重叠（余弦式归一化），不做向量检索。

use std::collections::HashSet;

use async_trait::async_trait;

use crate::retrieval::{Document, Passage, RetrievalClient, RetrievalError};

/// Acme Robotics 知识库
const ACME_DOCUMENTS: &[&str] = &[
    "Acme Robotics was founded in 2019 by CEO Dana Holt, formerly a principal engineer at Boston Dynamics.",
    "The company's flagship product is the AX-7, a warehouse navigation robot that uses lidar and a proprietary pathfinding algorithm called GridMind.",
    "GridMind was developed by Dr. Yusuf Okafor, Acme's Head of AI, who joined from CMU's robotics lab in 2021.",
    "Acme closed a $42M Series B in March 2024 led by Horizon Ventures. The round included participation from Ford's strategic investment arm.",
    "The AX-7 is deployed in 14 fulfillment centers across the Midwest, including three operated by a logistics firm called GreatLakes Distribution.",
    "Acme's main competitor is Fulcrum Robotics, which makes the R-Series robots and has 3x the revenue but older sensor tech.",
    "Dana Holt's long-term vision is to expand into hospital logistics by 2027, targeting medication delivery and sterile supply chain.",
    "Acme employs 87 people as of Q1 2025. Engineering is 60% of headcount. The office is in Ann Arbor, Michigan.",
    "The AX-7 has a list price of $85,000 per unit. GreatLakes Distribution operates 23 units and is Acme's largest single customer.",
    "Acme is in early talks with a European distributor, Munich-based RoboLogistik GmbH, to expand into the EU market in 2026.",
];

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "of", "and", "or", "is", "was", "are", "in", "on", "to", "by", "for",
    "what", "who", "which", "how", "its", "it", "as", "at", "with", "from", "that", "this", "does",
];

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '-')
        .map(|w| w.trim_matches('-').to_lowercase())
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

pub struct StaticCorpus {
    documents: Vec<String>,
    index: Vec<HashSet<String>>,
}

impl StaticCorpus {
    pub fn new(documents: Vec<String>) -> Self {
        let index = documents.iter().map(|d| terms(d)).collect();
        Self { documents, index }
    }

    pub fn acme() -> Self {
        Self::new(ACME_DOCUMENTS.iter().map(|d| d.to_string()).collect())
    }

    fn score(query: &HashSet<String>, doc: &HashSet<String>) -> f32 {
        if query.is_empty() || doc.is_empty() {
            return 0.0;
        }
        let overlap = query.intersection(doc).count() as f32;
        overlap / ((query.len() * doc.len()) as f32).sqrt()
    }
}

impl Default for StaticCorpus {
    fn default() -> Self {
        Self::acme()
    }
}

#[async_trait]
impl RetrievalClient for StaticCorpus {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, RetrievalError> {
        let query = terms(query);
        let mut scored: Vec<Passage> = self
            .index
            .iter()
            .zip(&self.documents)
            .enumerate()
            .map(|(i, (doc_terms, content))| Passage {
                doc_id: i as u64,
                content: content.clone(),
                score: Self::score(&query, doc_terms),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.doc_id.cmp(&b.doc_id)));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn list_documents(&self) -> Result<Vec<Document>, RetrievalError> {
        Ok(self
            .documents
            .iter()
            .enumerate()
            .map(|(i, content)| Document {
                doc_id: i as u64,
                content: content.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_ranks_relevant_first() {
        let corpus = StaticCorpus::acme();
        let hits = corpus.search("Who developed GridMind?", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits[0].content.contains("Yusuf Okafor"));
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_list_documents() {
        let docs = StaticCorpus::acme().list_documents().await.unwrap();
        assert_eq!(docs.len(), 10);
        assert_eq!(docs[0].doc_id, 0);
    }

    #[tokio::test]
    async fn test_top_k_larger_than_corpus() {
        let corpus = StaticCorpus::new(vec!["one doc".into()]);
        assert_eq!(corpus.search("doc", 5).await.unwrap().len(), 1);
    }
}
