use crate::UserId;

/// The signed-in user, as exposed by the authentication layer
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Actor {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Read-only view over the authentication collaborator
pub trait Session {
    fn current_actor(&self) -> Option<Actor>;

    fn is_authenticated(&self) -> bool {
        self.current_actor().is_some()
    }
}

impl Session for Option<Actor> {
    fn current_actor(&self) -> Option<Actor> {
        self.clone()
    }
}

impl<S: Session + ?Sized> Session for std::rc::Rc<S> {
    fn current_actor(&self) -> Option<Actor> {
        (**self).current_actor()
    }
}

impl<S: Session + ?Sized> Session for std::sync::Arc<S> {
    fn current_actor(&self) -> Option<Actor> {
        (**self).current_actor()
    }
}
