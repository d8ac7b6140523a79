//! Frontier of discovered-but-unfetched URLs
//!
//! Two orderings are supported:
//! - FIFO, giving breadth-first traversal
//! - Most-connected-score, where URLs with more distinct inbound
//!   discoveries are fetched first and ties go to the earlier insertion
//!
//! The score queue uses lazy invalidation: when a queued URL's score rises,
//! a fresh entry is pushed and the old one is discarded when it surfaces.

use crate::policy::CrawlStrategy;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

/// A URL in the score queue with the score it had when pushed
#[derive(Debug, Clone)]
struct ScoredUrl {
    url: String,
    score: u32,
    seq: u64,
}

// Higher scores pop first; among equal scores, lower sequence numbers do
impl Ord for ScoredUrl {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScoredUrl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScoredUrl {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.seq == other.seq
    }
}

impl Eq for ScoredUrl {}

#[derive(Debug)]
enum Queue {
    Fifo(VecDeque<String>),
    Scored(BinaryHeap<ScoredUrl>),
}

/// Frontier queue for one crawl run
#[derive(Debug)]
pub struct Frontier {
    queue: Queue,
    scores: HashMap<String, u32>,
    enqueued: HashSet<String>,
    next_seq: u64,
}

impl Frontier {
    /// Creates an empty frontier ordered for `strategy`
    ///
    /// Only the ordering half of the strategy matters here; browser and
    /// static variants share the same queue.
    pub fn new(strategy: CrawlStrategy) -> Self {
        let queue = match strategy.base() {
            CrawlStrategy::Mcs => Queue::Scored(BinaryHeap::new()),
            _ => Queue::Fifo(VecDeque::new()),
        };
        Self {
            queue,
            scores: HashMap::new(),
            enqueued: HashSet::new(),
            next_seq: 0,
        }
    }

    /// Adds a URL unless it has ever been enqueued in this run
    ///
    /// # Returns
    ///
    /// `true` if the URL was added
    pub fn offer(&mut self, url: &str) -> bool {
        if !self.enqueued.insert(url.to_string()) {
            return false;
        }
        if let Queue::Fifo(queue) = &mut self.queue {
            queue.push_back(url.to_string());
        } else {
            let score = self.score(url);
            self.push_scored(url, score);
        }
        true
    }

    /// Counts one more distinct inbound discovery of `url`
    ///
    /// Under score ordering, a URL that is already queued is re-pushed with
    /// its new score; the older entry goes stale.
    ///
    /// # Returns
    ///
    /// The URL's new score
    pub fn record_inbound(&mut self, url: &str) -> u32 {
        let score = {
            let entry = self.scores.entry(url.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        if matches!(self.queue, Queue::Scored(_)) && self.enqueued.contains(url) {
            self.push_scored(url, score);
        }
        score
    }

    /// Removes the next URL to fetch
    ///
    /// Entries for URLs in `visited` and stale score entries are skipped.
    pub fn poll(&mut self, visited: &HashSet<String>) -> Option<String> {
        match &mut self.queue {
            Queue::Fifo(queue) => {
                while let Some(url) = queue.pop_front() {
                    if !visited.contains(&url) {
                        return Some(url);
                    }
                }
                None
            }
            Queue::Scored(heap) => {
                while let Some(entry) = heap.pop() {
                    if visited.contains(&entry.url) {
                        continue;
                    }
                    let current = self.scores.get(&entry.url).copied().unwrap_or(0);
                    if current != entry.score {
                        continue;
                    }
                    return Some(entry.url);
                }
                None
            }
        }
    }

    /// True if `url` was ever offered successfully
    pub fn was_enqueued(&self, url: &str) -> bool {
        self.enqueued.contains(url)
    }

    /// Current score of a URL
    pub fn score(&self, url: &str) -> u32 {
        self.scores.get(url).copied().unwrap_or(0)
    }

    /// Number of queue entries, stale ones included
    pub fn len(&self) -> usize {
        match &self.queue {
            Queue::Fifo(queue) => queue.len(),
            Queue::Scored(heap) => heap.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_scored(&mut self, url: &str, score: u32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Queue::Scored(heap) = &mut self.queue {
            heap.push(ScoredUrl {
                url: url.to_string(),
                score,
                seq,
            });
        }
    }
}
