//! The relationship graph: Parent/Children, Owner/Assets, Location/Contents.
//!
//! Each relation stores a single forward edge plus an inverse list on the
//! peer. Both sides are maintained here and only here; callers never touch
//! the inverse lists directly. Setting an edge checks the target's chain so
//! no relation can be made cyclic.

use crate::components::{
    Assets, Children, Contents, GridLocation, Location, Owner, Parent, RoomLocation,
    SectorLocation,
};
use crate::error::CoreError;
use crate::objects::Entity;
use crate::world::World;

impl World {
    // -- Parent / Children --------------------------------------------------

    pub fn parent(&self, ent: Entity) -> Option<Entity> {
        self.get::<Parent>(ent).map(|p| p.0)
    }

    pub fn children(&self, ent: Entity) -> &[Entity] {
        self.get::<Children>(ent).map(|c| c.0.as_slice()).unwrap_or(&[])
    }

    pub fn set_parent(&mut self, ent: Entity, target: Option<Entity>) -> Result<(), CoreError> {
        if let Some(t) = target {
            self.check_chain(ent, t, |w, e| w.parent(e))?;
        }
        if let Some(old) = self.parent(ent) {
            self.get_or_attach::<Children>(old).0.retain(|e| *e != ent);
        }
        match target {
            Some(t) => {
                self.get_or_attach::<Children>(t).0.push(ent);
                self.attach(ent, Parent(t));
            }
            None => {
                self.detach::<Parent>(ent);
            }
        }
        self.mark_dirty(ent);
        Ok(())
    }

    // -- Owner / Assets -----------------------------------------------------

    pub fn owner(&self, ent: Entity) -> Option<Entity> {
        self.get::<Owner>(ent).map(|o| o.0)
    }

    pub fn assets(&self, ent: Entity) -> &[Entity] {
        self.get::<Assets>(ent).map(|a| a.0.as_slice()).unwrap_or(&[])
    }

    pub fn set_owner(&mut self, ent: Entity, target: Option<Entity>) -> Result<(), CoreError> {
        if let Some(t) = target {
            self.check_chain(ent, t, |w, e| w.owner(e))?;
        }
        if let Some(old) = self.owner(ent) {
            self.get_or_attach::<Assets>(old).0.retain(|e| *e != ent);
        }
        match target {
            Some(t) => {
                self.get_or_attach::<Assets>(t).0.push(ent);
                self.attach(ent, Owner(t));
            }
            None => {
                self.detach::<Owner>(ent);
            }
        }
        self.mark_dirty(ent);
        Ok(())
    }

    // -- Location / Contents ------------------------------------------------

    pub fn location(&self, ent: Entity) -> Option<Entity> {
        self.get::<Location>(ent).map(|l| l.target)
    }

    pub fn contents(&self, ent: Entity) -> &[Entity] {
        self.get::<Contents>(ent).map(|c| c.0.as_slice()).unwrap_or(&[])
    }

    pub fn set_location(&mut self, ent: Entity, target: Option<Entity>) -> Result<(), CoreError> {
        if let Some(t) = target {
            self.check_chain(ent, t, |w, e| w.location(e))?;
        }
        if let Some(old) = self.location(ent) {
            self.get_or_attach::<Contents>(old).0.retain(|e| *e != ent);
        }
        match target {
            Some(t) => {
                self.get_or_attach::<Contents>(t).0.push(ent);
                self.attach(ent, Location::at(t));
            }
            None => {
                self.detach::<Location>(ent);
            }
        }
        self.mark_dirty(ent);
        Ok(())
    }

    /// Walk the chain upward from `target`; reaching `ent` would close a loop.
    fn check_chain(
        &self,
        ent: Entity,
        target: Entity,
        step: impl Fn(&World, Entity) -> Option<Entity>,
    ) -> Result<(), CoreError> {
        let mut cursor = Some(target);
        while let Some(link) = cursor {
            if link == ent {
                return Err(CoreError::CyclicRelation);
            }
            cursor = step(self, link);
        }
        Ok(())
    }

    // -- deletion -----------------------------------------------------------

    /// Remove an object from the world. Every peer on every relation gets its
    /// side of the edge cleaned up; evacuees of a deleted holder keep no
    /// spatial locator (relocating them somewhere sensible is a higher
    /// layer's job).
    pub fn delete_object(&mut self, ent: Entity) {
        if !self.is_valid(ent) {
            return;
        }
        self.leave_spatial(ent);

        if let Some(parent) = self.parent(ent) {
            self.get_or_attach::<Children>(parent).0.retain(|e| *e != ent);
        }
        for child in self.children(ent).to_vec() {
            let _ = self.set_parent(child, None);
        }

        if let Some(owner) = self.owner(ent) {
            self.get_or_attach::<Assets>(owner).0.retain(|e| *e != ent);
        }
        for asset in self.assets(ent).to_vec() {
            let _ = self.set_owner(asset, None);
        }

        if let Some(location) = self.location(ent) {
            self.get_or_attach::<Contents>(location).0.retain(|e| *e != ent);
        }
        for occupant in self.contents(ent).to_vec() {
            let _ = self.set_location(occupant, None);
            self.detach::<RoomLocation>(occupant);
            self.detach::<GridLocation>(occupant);
            self.detach::<SectorLocation>(occupant);
        }

        // the id must land in the dirty set before the slot dies, so the
        // flush can delete the row
        self.mark_dirty(ent);
        self.components.forget(ent);
        self.objects.release(ent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Character, Item, Player};
    use crate::world::test_world;

    #[test]
    fn inverse_lists_follow_forward_edges() {
        let mut world = test_world();
        let bag = world.create_object();
        let coin = world.create_object();
        let gem = world.create_object();

        world.set_location(coin, Some(bag)).unwrap();
        world.set_location(gem, Some(bag)).unwrap();
        assert_eq!(world.location(coin), Some(bag));
        assert_eq!(world.contents(bag), &[coin, gem]);

        let pouch = world.create_object();
        world.set_location(coin, Some(pouch)).unwrap();
        assert_eq!(world.contents(bag), &[gem]);
        assert_eq!(world.contents(pouch), &[coin]);

        world.set_location(coin, None).unwrap();
        assert_eq!(world.location(coin), None);
        assert_eq!(world.contents(pouch), &[] as &[Entity]);
    }

    #[test]
    fn cycles_are_rejected_without_corrupting_state() {
        let mut world = test_world();
        let a = world.create_object();
        let b = world.create_object();
        let c = world.create_object();

        world.set_parent(b, Some(a)).unwrap();
        world.set_parent(c, Some(b)).unwrap();

        let err = world.set_parent(a, Some(c)).unwrap_err();
        assert!(matches!(err, CoreError::CyclicRelation));

        // nothing moved
        assert_eq!(world.parent(a), None);
        assert_eq!(world.parent(b), Some(a));
        assert_eq!(world.parent(c), Some(b));
        assert_eq!(world.children(a), &[b]);

        // self loops count too
        let err = world.set_location(a, Some(a)).unwrap_err();
        assert!(matches!(err, CoreError::CyclicRelation));
    }

    #[test]
    fn deleting_a_holder_clears_both_sides() {
        let mut world = test_world();
        let holder = world.create_object();
        world.attach(holder, Character);
        world.attach(holder, Player { account_id: 1 });
        let item = world.create_object();
        world.attach(item, Item);

        world.set_location(item, Some(holder)).unwrap();
        let holder_id = world.object_id(holder).unwrap();
        let item_id = world.object_id(item).unwrap();
        world.dirty.clear();

        world.delete_object(holder);

        assert!(!world.is_valid(holder));
        assert_eq!(world.location(item), None);
        assert!(world.dirty.contains(&holder_id));
        assert!(world.dirty.contains(&item_id));
    }

    #[test]
    fn deleting_a_member_updates_the_holder() {
        let mut world = test_world();
        let owner = world.create_object();
        let deed = world.create_object();
        world.set_owner(deed, Some(owner)).unwrap();
        assert_eq!(world.assets(owner), &[deed]);

        world.delete_object(deed);
        assert_eq!(world.assets(owner), &[] as &[Entity]);
    }
}
