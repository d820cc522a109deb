use contextual_json_log::{entry, ContextualLogger, Level, StaticSettings};
use serde_json::json;

/// A service component holding its own logger. Module, file name, base path
/// and environment come from `JSON_LOG_*` variables, falling back to
/// `logs/app/app.log` in `development`.
struct OrderService {
    logger: ContextualLogger,
    next_id: u64,
}

impl OrderService {
    fn new() -> Self {
        OrderService {
            logger: ContextualLogger::for_type::<Self, _>(StaticSettings::from_env()),
            next_id: 1,
        }
    }

    fn create(&mut self, customer: &str) -> Result<u64, Box<dyn std::error::Error>> {
        let id = self.next_id;
        self.next_id += 1;
        self.logger.log(
            entry!(Level::Info, "order created", json!({"id": id, "customer": customer}))
                .tags(["billing"])
                .description("new order"),
        )?;
        Ok(id)
    }

    fn cancel(&mut self, id: u64) -> Result<(), Box<dyn std::error::Error>> {
        self.logger.log(
            entry!(Level::Warning, "order cancelled", json!({"id": id}))
                .serialize_context(true),
        )?;
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut service = OrderService::new();
    let id = service.create("acme")?;
    service.cancel(id)?;

    println!("wrote records for order {id}");
    Ok(())
}
