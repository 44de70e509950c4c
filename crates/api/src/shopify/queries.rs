//! GraphQL documents for the Shopify Admin API.

/// Create a customer with tags and the GitHub metafield.
pub const CUSTOMER_CREATE: &str = r"
mutation CustomerCreate($input: CustomerInput!) {
  customerCreate(input: $input) {
    customer {
      id
    }
    userErrors {
      field
      message
    }
  }
}
";

/// Find customers by exact email.
pub const CUSTOMERS_BY_EMAIL: &str = r"
query CustomersByEmail($query: String!) {
  customers(first: 5, query: $query) {
    nodes {
      id
    }
  }
}
";

/// Append tags to a customer.
pub const TAGS_ADD: &str = r"
mutation TagsAdd($id: ID!, $tags: [String!]!) {
  tagsAdd(id: $id, tags: $tags) {
    node {
      id
    }
    userErrors {
      field
      message
    }
  }
}
";

/// Tags and order discount codes for one customer.
pub const CUSTOMER_SNAPSHOT: &str = r"
query CustomerSnapshot($id: ID!) {
  customer(id: $id) {
    tags
    orders(first: 100) {
      nodes {
        discountCodes
      }
    }
  }
}
";
