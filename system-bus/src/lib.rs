//! The system bus defines an embedded pubsub architecture in which
//! consumers may subscribe to a topic and producers may publish to the
//! topics with broadcast semantics
//!
//! Publishing to a topic with no subscribers is a no-op; a new subscriber
//! does not see historical messages. Each reader owns a bounded queue and
//! a reader that falls more than the queue depth behind is disconnected,
//! so publishers never block on a slow consumer

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

use std::{
    collections::HashMap,
    pin::Pin,
    sync::{
        atomic::{AtomicU16, Ordering},
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
    task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::mpsc::{channel, error::TrySendError, Receiver, Sender};

/// The number of messages buffered for a single reader; a reader that falls
/// further behind than this watermark is dropped from the topic
const READER_BUFFER_SIZE: usize = 32;

/// A type alias for a shared, concurrency safe, mutable pointer
type Shared<T> = Arc<RwLock<T>>;
/// The mesh mapping topic names to their fabric
type TopicMesh<M> = Shared<HashMap<String, Shared<TopicFabric<M>>>>;

// ----------------
// | Topic Reader |
// ----------------

/// A subscriber handle on a single topic
///
/// Holds the receiving end of the reader's bounded queue along with the
/// bookkeeping needed to deallocate the topic when the last reader drops
#[derive(Debug)]
pub struct TopicReader<M> {
    /// The name of the topic that this reader listens to
    topic_name: String,
    /// The receiving end of the reader's bounded queue
    receiver: Receiver<M>,
    /// A buffered message; used when a call to `has_next` pulls a value
    buffered_message: Option<M>,
    /// The number of readers on the topic; decremented on drop so the topic
    /// may be deallocated when the last reader leaves
    num_readers: Arc<AtomicU16>,
    /// A reference to the bus's topic mesh, used to deallocate the topic
    /// when the last reader drops
    topic_mesh: TopicMesh<M>,
}

impl<M> Unpin for TopicReader<M> {}

impl<M> TopicReader<M> {
    /// Construct a new reader for a topic
    fn new(
        topic_name: String,
        receiver: Receiver<M>,
        num_readers: Arc<AtomicU16>,
        topic_mesh: TopicMesh<M>,
    ) -> Self {
        // Record the new reader in the topic's count
        num_readers.fetch_add(1 /* val */, Ordering::Relaxed);
        Self { topic_name, receiver, buffered_message: None, num_readers, topic_mesh }
    }

    /// The topic this reader is subscribed to
    pub fn topic(&self) -> &str {
        &self.topic_name
    }

    /// Check whether there is a message waiting, without blocking
    ///
    /// A message pulled here is buffered for the next call to
    /// `next_message`
    pub fn has_next(&mut self) -> bool {
        if self.buffered_message.is_some() {
            return true;
        }

        if let Ok(message) = self.receiver.try_recv() {
            self.buffered_message = Some(message);
            true
        } else {
            false
        }
    }

    /// Await the next message published onto the topic
    ///
    /// Returns `None` if the reader was disconnected for falling behind the
    /// topic's buffer watermark
    pub async fn next_message(&mut self) -> Option<M> {
        if let Some(message) = self.buffered_message.take() {
            return Some(message);
        }

        self.receiver.recv().await
    }
}

impl<M> Stream for TopicReader<M> {
    type Item = M;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(message) = self.buffered_message.take() {
            return Poll::Ready(Some(message));
        }

        self.receiver.poll_recv(cx)
    }
}

/// A reference counting `Drop` implementation; the last reader on a topic
/// cleans the topic out of the bus's mesh
impl<M> Drop for TopicReader<M> {
    fn drop(&mut self) {
        let prev_num_readers = self.num_readers.fetch_sub(1 /* val */, Ordering::Relaxed);
        if prev_num_readers == 1 {
            let mut locked_mesh = self.topic_mesh.write().expect("topic_mesh lock poisoned");

            // Ensure no new subscription arrived while acquiring the lock,
            // otherwise the new reader would be left on a deallocated topic
            let new_num_readers = self.num_readers.load(Ordering::Relaxed);
            if new_num_readers > 0 {
                return;
            }

            locked_mesh.remove(&self.topic_name);
        } // locked_mesh released here
    }
}

// ----------------
// | Topic Fabric |
// ----------------

/// The per-topic fan-out primitive: one bounded queue per reader
#[derive(Debug)]
struct TopicFabric<M> {
    /// The name of the topic this fabric is allocated for
    topic_name: String,
    /// The sending half of each reader's queue
    senders: Vec<Sender<M>>,
    /// The number of readers on the given topic
    num_readers: Arc<AtomicU16>,
    /// A reference to the parent mesh the topic is stored in
    topic_mesh: TopicMesh<M>,
}

impl<M: Clone> TopicFabric<M> {
    /// Construct a new fabric for a registered topic
    fn new(topic_name: String, topic_mesh: TopicMesh<M>) -> Self {
        Self {
            topic_name,
            senders: Vec::new(),
            num_readers: Arc::new(AtomicU16::new(0 /* val */)),
            topic_mesh,
        }
    }

    /// Add a new reader to the fabric
    fn new_reader(&mut self) -> TopicReader<M> {
        let (sender, receiver) = channel(READER_BUFFER_SIZE);
        self.senders.push(sender);

        TopicReader::new(
            self.topic_name.clone(),
            receiver,
            self.num_readers.clone(),
            self.topic_mesh.clone(),
        )
    }

    /// Fan a message out to every reader on the topic
    ///
    /// A reader whose queue is full has fallen behind the watermark; its
    /// sender is dropped here, which surfaces to the reader as a closed
    /// stream. Publishing therefore never blocks
    fn write_message(&mut self, message: M) {
        self.senders.retain(|sender| match sender.try_send(message.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
        });
    }

    /// Get the number of readers on the topic
    fn num_readers(&self) -> u16 {
        self.num_readers.load(Ordering::Relaxed)
    }
}

// --------------
// | System Bus |
// --------------

/// The system bus abstracts over an embedded pubsub functionality
///
/// Note that publishing to a topic with no subscribers is a no-op
#[derive(Clone, Debug)]
pub struct SystemBus<M> {
    /// The topic mesh connects publishers to subscribers, concretely a
    /// mapping from topic name to the topic's fan-out fabric
    topic_mesh: TopicMesh<M>,
}

impl<M: Clone> Default for SystemBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Clone> SystemBus<M> {
    /// Construct a new system bus
    pub fn new() -> Self {
        Self { topic_mesh: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Acquire a read lock on the topic mesh
    fn read_topic_mesh(&self) -> RwLockReadGuard<HashMap<String, Shared<TopicFabric<M>>>> {
        self.topic_mesh.read().expect("topic_mesh lock poisoned")
    }

    /// Acquire a write lock on the topic mesh
    fn write_topic_mesh(&self) -> RwLockWriteGuard<HashMap<String, Shared<TopicFabric<M>>>> {
        self.topic_mesh.write().expect("topic_mesh lock poisoned")
    }

    /// Publish a message onto a topic; never blocks
    pub fn publish(&self, topic: String, message: M) {
        let locked_mesh = self.read_topic_mesh();
        let topic_entry = locked_mesh.get(&topic);

        // If the topic is not registered, there are no listeners, short circuit
        if topic_entry.is_none() {
            return;
        }

        // Otherwise, lock the topic and fan the message out
        let mut locked_topic =
            topic_entry.unwrap().write().expect("topic_entry lock poisoned");
        locked_topic.write_message(message);
    }

    /// Subscribe to a topic, returning a pollable reader
    pub fn subscribe(&self, topic: String) -> TopicReader<M> {
        // If the topic is not yet registered, create one
        let contains_topic = { self.read_topic_mesh().contains_key(&topic) };
        if !contains_topic {
            let mut locked_mesh = self.write_topic_mesh();
            locked_mesh.insert(
                topic.clone(),
                Arc::new(RwLock::new(TopicFabric::new(topic.clone(), self.topic_mesh.clone()))),
            );
        } // locked_mesh released

        // Build a reader on the topic of interest
        let locked_mesh = self.read_topic_mesh();
        let mut locked_topic =
            locked_mesh.get(&topic).unwrap().write().expect("topic_entry lock poisoned");

        locked_topic.new_reader()
    }

    /// Returns the number of listeners on a topic
    pub fn num_listeners(&self, topic: &str) -> u16 {
        if let Some(topic_entry) = self.read_topic_mesh().get(topic) {
            let locked_topic = topic_entry.read().expect("topic_entry lock poisoned");
            locked_topic.num_readers()
        } else {
            0
        }
    }

    /// Returns whether the given topic has any subscribed readers, i.e.
    /// whether the topic is allocated in the underlying mesh
    pub fn has_listeners(&self, topic: &str) -> bool {
        self.read_topic_mesh().contains_key(topic)
    }
}

#[cfg(test)]
mod system_bus_tests {
    use rand::{thread_rng, RngCore};

    use super::{SystemBus, READER_BUFFER_SIZE};

    const TEST_TOPIC: &str = "test-topic";

    /// Tests a simple send and receive
    #[tokio::test]
    async fn test_send_recv() {
        let mut rng = thread_rng();
        let message = rng.next_u64();

        let pubsub = SystemBus::<u64>::new();
        let mut reader = pubsub.subscribe(TEST_TOPIC.to_string());

        pubsub.publish(TEST_TOPIC.to_string(), message);

        let res = reader.next_message().await;
        assert_eq!(res, Some(message));
    }

    /// Tests the `has_next` method on the topic reader
    #[tokio::test]
    async fn test_has_next() {
        let mut rng = thread_rng();
        let message1 = rng.next_u64();
        let message2 = rng.next_u64();

        let pubsub = SystemBus::<u64>::new();
        let mut reader = pubsub.subscribe(TEST_TOPIC.to_string());

        pubsub.publish(TEST_TOPIC.to_string(), message1);
        pubsub.publish(TEST_TOPIC.to_string(), message2);

        assert!(reader.has_next());
        assert_eq!(Some(message1), reader.next_message().await);
        assert_eq!(Some(message2), reader.next_message().await);
    }

    /// Tests that a reader joining after messages are sent *does not*
    /// receive old messages
    #[tokio::test]
    async fn test_subscribe_after_send() {
        let mut rng = thread_rng();
        let message1 = rng.next_u64();
        let message2 = rng.next_u64();

        // The first publish has no subscribers and is a no-op
        let pubsub = SystemBus::<u64>::new();
        pubsub.publish(TEST_TOPIC.to_string(), message1);

        // Now subscribe a reader and send a second message; only message2
        // should be delivered
        let mut reader = pubsub.subscribe(TEST_TOPIC.to_string());
        pubsub.publish(TEST_TOPIC.to_string(), message2);

        assert!(reader.has_next());
        assert_eq!(Some(message2), reader.next_message().await);
        assert!(!reader.has_next());
    }

    /// Tests that readers joining in between messages receive only the
    /// messages they were active for
    #[tokio::test]
    async fn test_readers_staggered_join() {
        let mut rng = thread_rng();
        let message1 = rng.next_u64();
        let message2 = rng.next_u64();

        let pubsub = SystemBus::<u64>::new();
        let mut reader1 = pubsub.subscribe(TEST_TOPIC.to_string());
        pubsub.publish(TEST_TOPIC.to_string(), message1);

        let mut reader2 = pubsub.subscribe(TEST_TOPIC.to_string());
        assert!(reader1.has_next());
        assert!(!reader2.has_next());

        pubsub.publish(TEST_TOPIC.to_string(), message2);

        assert_eq!(Some(message1), reader1.next_message().await);
        assert_eq!(Some(message2), reader1.next_message().await);
        assert_eq!(Some(message2), reader2.next_message().await);
    }

    /// Tests the num_listeners method
    #[tokio::test]
    async fn test_num_listeners() {
        let pubsub = SystemBus::<()>::new();
        assert_eq!(0, pubsub.num_listeners(TEST_TOPIC));

        let _reader1 = pubsub.subscribe(TEST_TOPIC.to_string());
        assert_eq!(1, pubsub.num_listeners(TEST_TOPIC));

        let _reader2 = pubsub.subscribe(TEST_TOPIC.to_string());
        assert_eq!(2, pubsub.num_listeners(TEST_TOPIC));
    }

    /// Tests that topics are deallocated from the mesh when the last reader
    /// is dropped
    #[tokio::test]
    async fn test_dealloc_topic() {
        let pubsub = SystemBus::<u64>::new();
        assert!(!pubsub.has_listeners(TEST_TOPIC));

        let reader1 = pubsub.subscribe(TEST_TOPIC.to_string());
        assert!(pubsub.has_listeners(TEST_TOPIC));

        drop(reader1);
        assert!(!pubsub.has_listeners(TEST_TOPIC));

        // Add two readers, drop them one by one
        let reader2 = pubsub.subscribe(TEST_TOPIC.to_string());
        let reader3 = pubsub.subscribe(TEST_TOPIC.to_string());
        assert!(pubsub.has_listeners(TEST_TOPIC));

        drop(reader3);
        assert!(pubsub.has_listeners(TEST_TOPIC));

        drop(reader2);
        assert!(!pubsub.has_listeners(TEST_TOPIC));
    }

    /// Tests that a reader which falls behind the buffer watermark is
    /// disconnected rather than back-pressuring the publisher
    #[tokio::test]
    async fn test_slow_reader_disconnected() {
        let pubsub = SystemBus::<u64>::new();
        let mut slow_reader = pubsub.subscribe(TEST_TOPIC.to_string());

        // Fill the reader's buffer, then overflow it by one
        for i in 0..(READER_BUFFER_SIZE as u64 + 1) {
            pubsub.publish(TEST_TOPIC.to_string(), i);
        }

        // The buffered messages are still delivered, then the stream ends
        for i in 0..(READER_BUFFER_SIZE as u64) {
            assert_eq!(Some(i), slow_reader.next_message().await);
        }
        assert_eq!(None, slow_reader.next_message().await);
    }
}
