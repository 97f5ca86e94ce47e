/// 이벤트 브로드캐스트 계층
/// 모든 경매 이벤트를 Kafka 토픽(경매 id 키)에 발행하고, 접속 중인
/// WebSocket 관찰자에게는 인프로세스 브로드캐스트 채널로 팬아웃한다.
/// 발행은 상태 변경에 대해 fire-and-forget: 실패는 로깅만 한다.
// region:    --- Imports
use crate::auction::events::{auction_topic, AuctionEvent};
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

// endregion: --- Imports

// region:    --- Broadcaster Trait

/// 경매 토픽으로의 이벤트 발행 (스케줄러/구매 경로가 사용)
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, event: &AuctionEvent) -> Result<(), String>;
}

// endregion: --- Broadcaster Trait

// region:    --- Kafka Producer

#[derive(Clone)]
pub struct KafkaProducer {
    producer: Arc<FutureProducer>,
}

/// KafkaProducer 구현
impl KafkaProducer {
    pub fn new(brokers: &str) -> Self {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .expect("Producer creation error");

        KafkaProducer {
            producer: Arc::new(producer),
        }
    }

    /// 메시지 전송
    pub async fn send_message(&self, topic: &str, key: &str, value: &str) -> Result<(), String> {
        debug!(
            "{:<12} --> Kafka 메시지 전송: topic={}, key={}",
            "Producer", topic, key
        );
        let record = FutureRecord::to(topic).key(key).payload(value);

        self.producer
            .send(record, std::time::Duration::from_secs(0))
            .await
            .map_err(|(e, _)| format!("Error sending message: {:?}", e))?;

        Ok(())
    }
}

/// 경매 이벤트 토픽 생성 (서비스 기동 시 1회)
pub async fn create_event_topic(
    brokers: &str,
    topic_name: &str,
    num_partitions: i32,
    replication_factor: i32,
) -> Result<(), String> {
    info!("{:<12} --> Kafka 토픽 생성 시작: {}", "Broadcast", topic_name);

    let admin_client: AdminClient<DefaultClientContext> = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .create()
        .map_err(|e| format!("AdminClient 생성 실패: {:?}", e))?;

    let new_topic = NewTopic::new(
        topic_name,
        num_partitions,
        TopicReplication::Fixed(replication_factor),
    );

    match admin_client
        .create_topics(&[new_topic], &AdminOptions::new())
        .await
    {
        Ok(_) => {
            info!("{:<12} --> Kafka 토픽 생성 성공: {}", "Broadcast", topic_name);
            Ok(())
        }
        Err(e) => {
            error!("{:<12} --> Kafka 토픽 생성 실패: {:?}", "Broadcast", e);
            Err(format!("토픽 생성 실패: {:?}", e))
        }
    }
}

// endregion: --- Kafka Producer

// region:    --- Topic Registry

/// 경매별 인프로세스 팬아웃 채널
/// 채널 용량을 넘겨 Lagged 가 된 수신자는 이벤트를 버리고
/// 스냅샷 재조회로 복구한다 (at-most-once 전달).
pub struct TopicRegistry {
    topics: Mutex<HashMap<i64, broadcast::Sender<AuctionEvent>>>,
}

const TOPIC_CHANNEL_CAPACITY: usize = 64;

impl Default for TopicRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// 경매 토픽 구독
    pub fn join(&self, connection_id: &str, auction_id: i64) -> broadcast::Receiver<AuctionEvent> {
        info!(
            "{:<12} --> 토픽 구독: connection={}, topic={}",
            "Broadcast",
            connection_id,
            auction_topic(auction_id)
        );
        let mut topics = self.topics.lock().unwrap();
        topics
            .entry(auction_id)
            .or_insert_with(|| broadcast::channel(TOPIC_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// 경매 토픽 구독 해제 (수신자가 모두 떠난 토픽은 정리)
    pub fn leave(&self, connection_id: &str, auction_id: i64) {
        info!(
            "{:<12} --> 토픽 구독 해제: connection={}, topic={}",
            "Broadcast",
            connection_id,
            auction_topic(auction_id)
        );
        let mut topics = self.topics.lock().unwrap();
        if let Some(sender) = topics.get(&auction_id) {
            if sender.receiver_count() == 0 {
                topics.remove(&auction_id);
            }
        }
    }

    /// 접속 중인 관찰자에게 팬아웃. 수신자가 없으면 조용히 버린다.
    pub fn fanout(&self, event: &AuctionEvent) {
        let topics = self.topics.lock().unwrap();
        if let Some(sender) = topics.get(&event.auction_id()) {
            let _ = sender.send(event.clone());
        }
    }
}

// endregion: --- Topic Registry

// region:    --- Event Broadcaster

/// Kafka 발행 + 인프로세스 팬아웃을 묶은 운영용 브로드캐스터
pub struct EventBroadcaster {
    producer: Arc<KafkaProducer>,
    registry: Arc<TopicRegistry>,
    topic_name: String,
}

impl EventBroadcaster {
    pub fn new(producer: Arc<KafkaProducer>, registry: Arc<TopicRegistry>, topic_name: &str) -> Self {
        Self {
            producer,
            registry,
            topic_name: topic_name.to_string(),
        }
    }
}

#[async_trait]
impl Broadcaster for EventBroadcaster {
    async fn publish(&self, event: &AuctionEvent) -> Result<(), String> {
        let payload = serde_json::to_string(event).map_err(|e| e.to_string())?;
        info!(
            "{:<12} --> 이벤트 발행: {} (경매 {})",
            "Broadcast",
            event.name(),
            event.auction_id()
        );

        // 접속 관찰자 팬아웃은 Kafka 성패와 무관하게 수행
        self.registry.fanout(event);

        self.producer
            .send_message(&self.topic_name, &auction_topic(event.auction_id()), &payload)
            .await
    }
}

// endregion: --- Event Broadcaster

// region:    --- Tests


// endregion: --- Tests
