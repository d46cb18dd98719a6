//! Example: save part of a world and load it into another
//!
//! Run with `--features profiling` to also write `trace.json`.

use archetype_snapshot::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Position {
    x: f32,
    y: f32,
}

impl SaveComponent for Position {
    const TYPE_NAME: &'static str = "demo::Position";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Follows {
    leader: EntityId,
}

impl SaveComponent for Follows {
    const TYPE_NAME: &'static str = "demo::Follows";

    fn entity_fields() -> Vec<EntityField<Self>> {
        vec![EntityField::single(
            "leader",
            |f: &Self| &f.leader,
            |f: &mut Self| &mut f.leader,
        )]
    }
}

fn main() -> Result<()> {
    #[cfg(feature = "profiling")]
    let _guard = archetype_snapshot::profiling::init_json_subscriber("trace.json", tracing::Level::DEBUG)?;

    let mut types = ComponentTypes::new();
    types.register::<Position>()?.register::<Follows>()?.register::<SerializationTag>()?;
    let serializer = WorldSerializer::with_config(types, SnapshotConfig::default().with_pretty_print(true));

    let mut world = World::new();
    let leader = world.spawn((Position { x: 0.0, y: 0.0 }, SerializationTag::new("leader")))?;
    let follower = world.spawn((Position { x: 1.0, y: 0.0 }, Follows { leader }))?;
    let stray = world.spawn((Position { x: 5.0, y: 5.0 },))?;

    let json = serializer.save_to_string(&world, &[leader, follower])?;
    println!("Saved {} of {} entities:\n{json}", 2, world.entity_count());

    let mut restored = World::new();
    restored.spawn((Position::default(),))?;
    let result = serializer.load_str(&mut restored, &json)?;

    let new_leader = result.keyed("leader");
    let new_follower = result.entity(follower);
    println!("leader   {leader:?} -> {new_leader:?}");
    println!("follower {follower:?} -> {new_follower:?}");
    if let Some(follows) = new_follower.and_then(|e| restored.get::<Follows>(e)) {
        println!("follower now follows {:?}", follows.leader);
    }
    println!("{stray:?} was not saved; restored world holds {} entities", restored.entity_count());
    Ok(())
}
