//! Wires one service into a running process.
//!
//! Startup has two steps. [`Listeners::bind`] claims every endpoint the
//! service owns, so the addresses are known before anything runs. [`start`]
//! then builds the service and attaches it to those listeners, its
//! publisher, its peer responder and its replica subscriptions. Binding
//! first lets a test start a whole system on ephemeral ports and hand every
//! node the real addresses of the others.

use std::sync::Arc;
use std::time::Duration;

use common::ServiceName;
use fabric::{CommandServer, Endpoints, PeerResponder, Publisher, ServerHandle, ServiceEndpoints};
use replica::{ReplicaDispatcher, ReplicaHandler, ReplicaStatsHandle, ReplicaTask};
use store::Store;
use tokio::net::TcpListener;

use crate::contracts::{PriceQuery, StockQuery};
use crate::customer::{CustomerService, CustomerState};
use crate::inventory::{
    DecrementOnOrderLine, InventoryService, InventoryState, StockResponder, StockRowsOnProductCreated,
};
use crate::order::{ObserveCreated, OrderService, OrderState};
use crate::pricing::{DefaultPriceOnProductCreated, PriceResponder, PricingService, PricingState};
use crate::product::{ProductPeers, ProductService, ProductState};
use crate::{Result, ServiceError};

/// The bound, not yet serving, endpoints of one service.
#[derive(Debug)]
pub struct Listeners {
    service: ServiceName,
    command: TcpListener,
    publish: Option<TcpListener>,
    peer: Option<TcpListener>,
}

impl Listeners {
    /// Binds every endpoint `service` owns at the given addresses.
    pub async fn bind(service: ServiceName, addrs: &ServiceEndpoints) -> Result<Self> {
        let command = TcpListener::bind(&addrs.command).await?;
        let publish = match service.publish_port().and(addrs.publish.as_deref()) {
            Some(addr) => Some(TcpListener::bind(addr).await?),
            None => None,
        };
        let peer = match service.peer_port().and(addrs.peer.as_deref()) {
            Some(addr) => Some(TcpListener::bind(addr).await?),
            None => None,
        };
        Ok(Self {
            service,
            command,
            publish,
            peer,
        })
    }

    pub fn service(&self) -> ServiceName {
        self.service
    }

    /// The addresses actually bound, with ephemeral ports resolved.
    pub fn endpoints(&self) -> Result<ServiceEndpoints> {
        Ok(ServiceEndpoints {
            command: self.command.local_addr()?.to_string(),
            publish: self.publish.as_ref().map(|l| l.local_addr()).transpose()?.map(|a| a.to_string()),
            peer: self.peer.as_ref().map(|l| l.local_addr()).transpose()?.map(|a| a.to_string()),
        })
    }
}

/// A service serving on its endpoints.
#[derive(Debug)]
pub struct RunningNode {
    service: ServiceName,
    command: ServerHandle,
    peer: Option<ServerHandle>,
    publisher: Option<Publisher>,
    replicas: Option<ReplicaTask>,
}

impl RunningNode {
    pub fn service(&self) -> ServiceName {
        self.service
    }

    pub fn command_addr(&self) -> String {
        self.command.local_addr().to_string()
    }

    pub fn peer_addr(&self) -> Option<String> {
        self.peer.as_ref().map(|p| p.local_addr().to_string())
    }

    pub fn publisher(&self) -> Option<&Publisher> {
        self.publisher.as_ref()
    }

    /// Per-handler stats of the node's replica subscriptions, if it has any.
    pub fn replica_stats(&self) -> Option<&ReplicaStatsHandle> {
        self.replicas.as_ref().map(|r| r.stats())
    }

    /// Stops listening, ends the subscriptions and closes the publisher.
    pub async fn stop(self) {
        if let Some(replicas) = self.replicas {
            replicas.stop().await;
        }
        if let Some(peer) = self.peer {
            peer.stop().await;
        }
        self.command.stop().await;
        if let Some(publisher) = self.publisher {
            publisher.shutdown();
        }
        tracing::info!(service = %self.service, "node stopped");
    }
}

fn required<T>(value: Option<T>, what: &str, service: ServiceName) -> Result<T> {
    value.ok_or_else(|| ServiceError::Config(format!("{service} needs a {what} endpoint")))
}

fn subscriptions(handlers: Vec<(String, Arc<dyn ReplicaHandler>)>) -> ReplicaTask {
    let mut dispatcher = ReplicaDispatcher::new();
    for (endpoint, handler) in handlers {
        dispatcher.register(endpoint, handler);
    }
    dispatcher.spawn()
}

/// Starts `listeners.service()` on its bound listeners.
///
/// `directory` says where the other services' endpoints are.
#[tracing::instrument(skip_all, fields(service = %listeners.service))]
pub async fn start(listeners: Listeners, directory: &Endpoints, call_timeout: Duration) -> Result<RunningNode> {
    let Listeners {
        service,
        command,
        publish,
        peer,
    } = listeners;
    let publisher = publish.map(Publisher::from_listener).transpose()?;
    let server = CommandServer::from_listener(command)?;

    let product_feed = || required(directory.publish(ServiceName::Product), "product publish", service);

    let (command, peer, replicas) = match service {
        ServiceName::Product => {
            let peers = ProductPeers::new(
                required(directory.peer(ServiceName::Pricing), "pricing peer", service)?,
                required(directory.peer(ServiceName::Inventory), "inventory peer", service)?,
                call_timeout,
            );
            let publisher = required(publisher.clone(), "publish", service)?;
            let product = ProductService::new(Store::<ProductState>::default(), publisher).with_peers(peers);
            (server.spawn(Arc::new(product)), None, None)
        }
        ServiceName::Customer => {
            let publisher = required(publisher.clone(), "publish", service)?;
            let customer = CustomerService::new(Store::<CustomerState>::default(), publisher);
            (server.spawn(Arc::new(customer)), None, None)
        }
        ServiceName::Inventory => {
            let store = Store::<InventoryState>::default();
            let responder = PeerResponder::<StockQuery>::from_listener(required(peer, "peer", service)?)?;
            let replicas = subscriptions(vec![
                (
                    product_feed()?,
                    Arc::new(StockRowsOnProductCreated::new(store.clone())) as Arc<dyn ReplicaHandler>,
                ),
                (
                    required(directory.publish(ServiceName::Order), "order publish", service)?,
                    Arc::new(DecrementOnOrderLine::new(store.clone())),
                ),
            ]);
            let peer = responder.spawn(Arc::new(StockResponder::new(store.clone())));
            (server.spawn(Arc::new(InventoryService::new(store))), Some(peer), Some(replicas))
        }
        ServiceName::Pricing => {
            let store = Store::<PricingState>::default();
            let responder = PeerResponder::<PriceQuery>::from_listener(required(peer, "peer", service)?)?;
            let replicas = subscriptions(vec![(
                product_feed()?,
                Arc::new(DefaultPriceOnProductCreated::new(store.clone())) as Arc<dyn ReplicaHandler>,
            )]);
            let peer = responder.spawn(Arc::new(PriceResponder::new(store.clone())));
            (server.spawn(Arc::new(PricingService::new(store))), Some(peer), Some(replicas))
        }
        ServiceName::Order => {
            let store = Store::<OrderState>::default();
            let publisher = required(publisher.clone(), "publish", service)?;
            let replicas = subscriptions(vec![
                (
                    product_feed()?,
                    Arc::new(ObserveCreated::products(store.clone())) as Arc<dyn ReplicaHandler>,
                ),
                (
                    required(directory.publish(ServiceName::Customer), "customer publish", service)?,
                    Arc::new(ObserveCreated::customers(store.clone())),
                ),
            ]);
            (server.spawn(Arc::new(OrderService::new(store, publisher))), None, Some(replicas))
        }
    };

    tracing::info!(
        command = %command.local_addr(),
        publish = ?publisher.as_ref().and_then(|p| p.local_addr()),
        peer = ?peer.as_ref().map(|p| p.local_addr()),
        "node started"
    );
    Ok(RunningNode {
        service,
        command,
        peer,
        publisher,
        replicas,
    })
}

/// Binds and starts `service` at `addrs`.
pub async fn run(
    service: ServiceName,
    addrs: &ServiceEndpoints,
    directory: &Endpoints,
    call_timeout: Duration,
) -> Result<RunningNode> {
    let listeners = Listeners::bind(service, addrs).await?;
    start(listeners, directory, call_timeout).await
}
