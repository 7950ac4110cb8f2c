use super::{Corpus, Scope, lookup};
use crate::Result;
use crate::data::RowFilter;
use crate::store::VersionStore;
use crate::store::path_utils::file_stem;
use crate::tables::{LANGUAGE_TABLE, Record, SentenceDetailed};
use crate::update::UpdateRequest;
use clap::ValueEnum;
use ohno::bail;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::vec;

const LOG_TARGET: &str = "  parallel";

const LINKS_TABLE: &str = "links";

/// How far a translation is from its sentence in the translation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Distance {
    /// Direct translations
    #[default]
    Direct,

    /// Translations of a translation that are not direct translations
    Indirect,
}

/// The requests that bring the files of the `source` to `target` parallel corpus up to date.
#[must_use]
pub fn parallel_requests(source: &str, target: &str) -> Vec<UpdateRequest> {
    vec![
        UpdateRequest::new(LANGUAGE_TABLE, [source, target]),
        UpdateRequest::new(LINKS_TABLE, [source, target]).oriented(),
    ]
}

/// Sentences paired with one of their translations, in link order.
#[derive(Debug)]
pub struct ParallelPairs {
    links: vec::IntoIter<(String, String)>,
    sentences: HashMap<String, SentenceDetailed>,
    translations: HashMap<String, SentenceDetailed>,
}

impl ParallelPairs {
    fn empty() -> Self {
        Self {
            links: Vec::new().into_iter(),
            sentences: HashMap::new(),
            translations: HashMap::new(),
        }
    }
}

impl Iterator for ParallelPairs {
    type Item = (SentenceDetailed, SentenceDetailed);

    fn next(&mut self) -> Option<Self::Item> {
        self.links.by_ref().find_map(|(sentence, translation)| {
            Some((self.sentences.get(&sentence)?.clone(), self.translations.get(&translation)?.clone()))
        })
    }
}

impl Corpus {
    /// The `source` sentences alongside their `target` translations.
    ///
    /// Reads the `<source>-<target>` links and the sentences of both languages, which must all
    /// come from the same export day. [`Distance::Indirect`] also reads the multilingual links
    /// file to find translations two links away.
    pub fn parallel(&self, source: &str, target: &str, distance: Distance) -> Result<ParallelPairs> {
        self.check_versions(source, target)?;

        let direct: Vec<(String, String)> = self
            .rows(LINKS_TABLE, &[source, target], Scope::All)?
            .filter_map(|row| id_pair(&row))
            .collect();

        let links = match distance {
            Distance::Direct => direct,
            Distance::Indirect => self.indirect_links(source, target, &direct)?,
        };

        if links.is_empty() {
            log::info!(target: LOG_TARGET, "No {distance} links from '{source}' to '{target}'");
            return Ok(ParallelPairs::empty());
        }

        let sentences = self.sentences(source, links.iter().map(|(sentence, _)| sentence.as_str()))?;
        let translations = self.sentences(target, links.iter().map(|(_, translation)| translation.as_str()))?;
        log::info!(
            target: LOG_TARGET,
            "{} {distance} links from '{source}' to '{target}' over {} and {} sentences",
            links.len(),
            sentences.len(),
            translations.len()
        );

        Ok(ParallelPairs {
            links: links.into_iter(),
            sentences,
            translations,
        })
    }

    /// Fail unless the links and both sentence files are present and from the same day.
    fn check_versions(&self, source: &str, target: &str) -> Result<()> {
        let links = lookup(LINKS_TABLE)?;
        let sentences = lookup(LANGUAGE_TABLE)?;
        let names = [
            links.slice_file_name(&[source, target]),
            sentences.slice_file_name(&[source]),
            sentences.slice_file_name(&[target]),
        ];

        let store = VersionStore::open(self.data_dir());
        let mut dates = Vec::with_capacity(names.len());
        for name in &names {
            let stem = file_stem(Path::new(name));
            let Some(version) = store.get(stem) else {
                bail!("no local version of '{stem}', update the {source}-{target} parallel corpus first");
            };
            dates.push(version.date());
        }

        if dates.windows(2).any(|pair| pair.first() != pair.last()) {
            bail!("the files of the {source}-{target} parallel corpus come from different exports, update them first");
        }

        Ok(())
    }

    /// Pairs of a `source` and a `target` sentence two links apart that are not directly linked.
    fn indirect_links(&self, source: &str, target: &str, direct: &[(String, String)]) -> Result<Vec<(String, String)>> {
        let master = self.path(lookup(LINKS_TABLE)?, &[], Scope::All);
        if !master.is_file() {
            bail!("indirect links need the multilingual links file '{}'", master.display());
        }

        let source_ids = self.sentence_ids(source)?;
        let target_ids = self.sentence_ids(target)?;

        // Intermediate sentence id to the source sentences linked to it, and to the target
        // sentences it links to.
        let mut from_source: HashMap<String, Vec<String>> = HashMap::new();
        let mut to_target: HashMap<String, Vec<String>> = HashMap::new();
        for row in self.rows(LINKS_TABLE, &[], Scope::All)? {
            let Some((from, to)) = id_pair(&row) else {
                continue;
            };
            if source_ids.contains(&from) {
                from_source.entry(to.clone()).or_default().push(from.clone());
            }
            if target_ids.contains(&to) {
                to_target.entry(from).or_default().push(to);
            }
        }

        let direct: HashSet<(&str, &str)> = direct
            .iter()
            .map(|(sentence, translation)| (sentence.as_str(), translation.as_str()))
            .collect();

        let mut pairs = BTreeSet::new();
        for (middle, sentences) in &from_source {
            let Some(translations) = to_target.get(middle) else {
                continue;
            };
            for sentence in sentences {
                for translation in translations {
                    if sentence != translation && !direct.contains(&(sentence.as_str(), translation.as_str())) {
                        let _ = pairs.insert((sentence.clone(), translation.clone()));
                    }
                }
            }
        }

        Ok(pairs.into_iter().collect())
    }

    fn sentence_ids(&self, language: &str) -> Result<HashSet<String>> {
        Ok(self
            .rows(LANGUAGE_TABLE, &[language], Scope::All)?
            .filter_map(|row| row.into_iter().next())
            .collect())
    }

    /// The sentences of `language` whose id is in `ids`, keyed by id.
    fn sentences<'a>(&self, language: &str, ids: impl Iterator<Item = &'a str>) -> Result<HashMap<String, SentenceDetailed>> {
        let filter = RowFilter::new(0, ids)?;
        Ok(self
            .rows(LANGUAGE_TABLE, &[language], Scope::All)?
            .filter(|row| filter.accepts(row))
            .filter_map(|row| Some((row.first()?.clone(), SentenceDetailed::from_row(row))))
            .collect())
    }
}

fn id_pair(row: &[String]) -> Option<(String, String)> {
    match row {
        [sentence, translation] => Some((sentence.clone(), translation.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;

    const ENG: &str = "1\teng\tHello.\tCK\t\\N\t\\N\n2\teng\tHi.\tCK\t\\N\t\\N\n";
    const FRA: &str = "3\tfra\tBonjour.\tsacredceltic\t\\N\t\\N\n4\tfra\tSalut.\tsacredceltic\t\\N\t\\N\n";
    const LINKS: &str = "1\t3\n3\t1\n1\t2\n2\t1\n3\t4\n4\t3\n";

    fn corpus(day: u32) -> (tempfile::TempDir, Corpus) {
        let dir = tempfile::tempdir().unwrap();
        let files = [
            ("sentences_detailed/eng_sentences_detailed.tsv", ENG),
            ("sentences_detailed/fra_sentences_detailed.tsv", FRA),
            ("links/links.csv", LINKS),
            ("links/fra-eng_links.tsv", "3\t1\n"),
        ];
        for (relative, content) in files {
            let path = dir.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        let mut store = VersionStore::open(dir.path());
        let version = |d: u32| NaiveDate::from_ymd_opt(2026, 10, d).unwrap().and_hms_opt(6, 0, 0).unwrap();
        store.set("eng_sentences_detailed", version(7)).unwrap();
        store.set("fra_sentences_detailed", version(7)).unwrap();
        store.set("fra-eng_links", version(day)).unwrap();

        let corpus = Corpus::new(dir.path());
        (dir, corpus)
    }

    fn texts(pairs: ParallelPairs) -> Vec<(String, String)> {
        pairs
            .map(|(sentence, translation)| (sentence.text().to_string(), translation.text().to_string()))
            .collect()
    }

    #[test]
    fn test_parallel_requests() {
        let requests = parallel_requests("fra", "eng");
        assert_eq!(requests[0], UpdateRequest::new("sentences_detailed", ["fra", "eng"]));
        assert_eq!(requests[1], UpdateRequest::new("links", ["fra", "eng"]).oriented());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_direct_pairs() {
        let (_dir, corpus) = corpus(7);
        let pairs = texts(corpus.parallel("fra", "eng", Distance::Direct).unwrap());
        assert_eq!(pairs, [("Bonjour.".to_string(), "Hello.".to_string())]);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_indirect_pairs_exclude_direct_ones() {
        let (_dir, corpus) = corpus(7);
        let pairs = texts(corpus.parallel("fra", "eng", Distance::Indirect).unwrap());
        assert_eq!(
            pairs,
            [
                ("Bonjour.".to_string(), "Hi.".to_string()),
                ("Salut.".to_string(), "Hello.".to_string()),
            ]
        );
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_versions_from_different_days_are_rejected() {
        let (_dir, corpus) = corpus(8);
        let err = corpus.parallel("fra", "eng", Distance::Direct).unwrap_err();
        assert!(err.to_string().contains("different exports"));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_missing_data_is_rejected() {
        let (_dir, corpus) = corpus(7);
        let err = corpus.parallel("eng", "fra", Distance::Direct).unwrap_err();
        assert!(err.to_string().contains("'eng-fra_links'"));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_no_links_yields_nothing() {
        let (dir, corpus) = corpus(7);
        fs::write(dir.path().join("links").join("fra-eng_links.tsv"), "").unwrap();
        assert_eq!(corpus.parallel("fra", "eng", Distance::Direct).unwrap().count(), 0);
    }
}
